/*
 * Copyright 2026 Oxide Computer Company
 */

//! Attribute names and values in the storage provider's own namespace.  These
//! are never exposed to consumers; the translator maps them into the public
//! names in crate::keys.

pub const DM_VENDOR_ID: &str = "vendor_id";
pub const DM_PRODUCT_ID: &str = "product_id";
pub const DM_OPATH: &str = "opath";
pub const DM_DEVID: &str = "devid";
pub const DM_MTYPE: &str = "mtype";
pub const DM_BLOCKSIZE: &str = "blocksize";
pub const DM_SIZE: &str = "size";
pub const DM_REMOVABLE: &str = "removable";
pub const DM_LOADED: &str = "loaded";
pub const DM_NHEADS: &str = "nheads";
pub const DM_NSECTORS: &str = "nsectors";
pub const DM_STATUS: &str = "status";
pub const DM_FDISK: &str = "fdisk";
pub const DM_EFI: &str = "efi";
pub const DM_CTYPE: &str = "ctype";
pub const DM_BTYPE: &str = "btype";

pub const DM_BOOTID: &str = "bootid";
pub const DM_PTYPE: &str = "ptype";
pub const DM_RELSECT: &str = "relsect";
pub const DM_BHEAD: &str = "bhead";
pub const DM_BSECT: &str = "bsect";
pub const DM_BCYL: &str = "bcyl";
pub const DM_EHEAD: &str = "ehead";
pub const DM_ESECT: &str = "esect";
pub const DM_ECYL: &str = "ecyl";

pub const DM_INDEX: &str = "index";
pub const DM_DEVT: &str = "devt";
pub const DM_START: &str = "start";
pub const DM_TAG: &str = "tag";
pub const DM_FLAG: &str = "flag";

pub const DM_DRIVE_UP: u32 = 1;

pub const DM_CTYPE_ATA: &str = "ata";
pub const DM_CTYPE_SCSI: &str = "scsi";
pub const DM_CTYPE_FIBRE: &str = "fibre channel";
pub const DM_CTYPE_USB: &str = "usb";
pub const DM_CTYPE_UNKNOWN: &str = "unknown";

/**
 * Kinds of media, as carried in the "mtype" attribute.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MediaType {
    Unknown = 0,
    Fixed = 1,
    Floppy = 2,
    Cdrom = 3,
    Zip = 4,
    Jaz = 5,
    Cdr = 6,
    Cdrw = 7,
    Dvdrom = 8,
    Dvdr = 9,
    Dvdram = 10,
    MoErasable = 11,
    MoWriteonce = 12,
    AsMo = 13,
}

impl MediaType {
    pub fn from_u32(v: u32) -> MediaType {
        match v {
            1 => MediaType::Fixed,
            2 => MediaType::Floppy,
            3 => MediaType::Cdrom,
            4 => MediaType::Zip,
            5 => MediaType::Jaz,
            6 => MediaType::Cdr,
            7 => MediaType::Cdrw,
            8 => MediaType::Dvdrom,
            9 => MediaType::Dvdr,
            10 => MediaType::Dvdram,
            11 => MediaType::MoErasable,
            12 => MediaType::MoWriteonce,
            13 => MediaType::AsMo,
            _ => MediaType::Unknown,
        }
    }

    pub fn is_optical(&self) -> bool {
        matches!(
            self,
            MediaType::Cdrom
                | MediaType::Cdr
                | MediaType::Cdrw
                | MediaType::Dvdrom
                | MediaType::Dvdr
                | MediaType::Dvdram
        )
    }
}
