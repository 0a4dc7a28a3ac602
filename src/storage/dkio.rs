/*
 * Copyright 2026 Oxide Computer Company
 */

//! Disk ioctls used to describe a whole-disk device.

use super::dm::MediaType;
use anyhow::Result;
use std::fs::File;

/*
 * Controller types reported by DKIOCINFO.
 */
pub const DKC_CDROM: u16 = 1;
pub const DKC_SCSI_CCS: u16 = 13;
pub const DKC_DIRECT: u16 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtlrInfo {
    pub cname: String,
    pub ctype: u16,
}

impl CtlrInfo {
    /**
     * The controller type as a name; the driver name distinguishes the
     * transports that share a controller type.
     */
    pub fn type_name(&self) -> &'static str {
        use super::dm::*;

        match (self.ctype, self.cname.as_str()) {
            (_, "scsa2usb") => DM_CTYPE_USB,
            (_, "fp") | (_, "fcp") => DM_CTYPE_FIBRE,
            (DKC_DIRECT, _) => DM_CTYPE_ATA,
            (DKC_SCSI_CCS, _) => DM_CTYPE_SCSI,
            _ => DM_CTYPE_UNKNOWN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub media_type: MediaType,
    pub lbsize: u32,
    pub capacity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub ncyl: u16,
    pub nhead: u16,
    pub nsect: u16,
}

pub fn media_type(dk: u32) -> MediaType {
    match dk {
        0x03 => MediaType::MoErasable,
        0x04 => MediaType::MoWriteonce,
        0x05 => MediaType::AsMo,
        0x08 => MediaType::Cdrom,
        0x09 => MediaType::Cdr,
        0x0a => MediaType::Cdrw,
        0x10 => MediaType::Dvdrom,
        0x11 => MediaType::Dvdr,
        0x12 => MediaType::Dvdram,
        0x10001 => MediaType::Fixed,
        0x10002 => MediaType::Floppy,
        0x10003 => MediaType::Zip,
        0x10004 => MediaType::Jaz,
        _ => MediaType::Unknown,
    }
}

#[cfg(target_os = "illumos")]
mod sys {
    use super::*;
    use anyhow::bail;
    use std::ffi::CStr;
    use std::os::unix::io::AsRawFd;

    const DKIOC: i32 = 0x04 << 8;
    const DKIOCGGEOM: i32 = DKIOC | 1;
    const DKIOCINFO: i32 = DKIOC | 3;
    const DKIOCREMOVABLE: i32 = DKIOC | 16;
    const DKIOCGMEDIAINFO: i32 = DKIOC | 42;

    const DK_DEVLEN: usize = 16;

    #[repr(C)]
    struct DkCinfo {
        dki_cname: [libc::c_char; DK_DEVLEN],
        dki_ctype: u16,
        dki_flags: u16,
        dki_cnum: u16,
        dki_addr: u32,
        dki_space: u32,
        dki_prio: u32,
        dki_vec: u32,
        dki_dname: [libc::c_char; DK_DEVLEN],
        dki_unit: u32,
        dki_partition: u16,
        dki_maxtransfer: u16,
    }

    #[repr(C)]
    struct DkMinfo {
        dki_media_type: u32,
        dki_lbsize: u32,
        dki_capacity: u64,
    }

    #[repr(C)]
    struct DkGeom {
        dkg_ncyl: u16,
        dkg_acyl: u16,
        dkg_bcyl: u16,
        dkg_nhead: u16,
        dkg_obs1: u16,
        dkg_nsect: u16,
        dkg_intrlv: u16,
        dkg_obs2: u16,
        dkg_obs3: u16,
        dkg_apc: u16,
        dkg_rpm: u16,
        dkg_pcyl: u16,
        dkg_write_reinstruct: u16,
        dkg_read_reinstruct: u16,
        dkg_extra: [u16; 7],
    }

    fn ioctl<T>(f: &File, cmd: i32, arg: &mut T, what: &str) -> Result<()> {
        let res = unsafe { libc::ioctl(f.as_raw_fd(), cmd, arg as *mut T) };
        if res < 0 {
            let err = std::io::Error::last_os_error();
            bail!("{} ioctl error: {}", what, err);
        }
        Ok(())
    }

    pub fn info(f: &File) -> Result<CtlrInfo> {
        let mut ci: DkCinfo = unsafe { std::mem::zeroed() };
        ioctl(f, DKIOCINFO, &mut ci, "DKIOCINFO")?;
        ci.dki_cname[DK_DEVLEN - 1] = 0;
        let cname = unsafe { CStr::from_ptr(ci.dki_cname.as_ptr()) }
            .to_string_lossy()
            .to_string();
        Ok(CtlrInfo { cname, ctype: ci.dki_ctype })
    }

    pub fn media(f: &File) -> Result<MediaInfo> {
        let mut mi: DkMinfo = unsafe { std::mem::zeroed() };
        ioctl(f, DKIOCGMEDIAINFO, &mut mi, "DKIOCGMEDIAINFO")?;
        Ok(MediaInfo {
            media_type: media_type(mi.dki_media_type),
            lbsize: mi.dki_lbsize,
            capacity: mi.dki_capacity,
        })
    }

    pub fn geometry(f: &File) -> Result<Geometry> {
        let mut g: DkGeom = unsafe { std::mem::zeroed() };
        ioctl(f, DKIOCGGEOM, &mut g, "DKIOCGGEOM")?;
        Ok(Geometry {
            ncyl: g.dkg_ncyl,
            nhead: g.dkg_nhead,
            nsect: g.dkg_nsect,
        })
    }

    pub fn removable(f: &File) -> Result<bool> {
        let mut r: libc::c_int = 0;
        ioctl(f, DKIOCREMOVABLE, &mut r, "DKIOCREMOVABLE")?;
        Ok(r != 0)
    }
}

#[cfg(not(target_os = "illumos"))]
mod sys {
    use super::*;
    use anyhow::bail;

    pub fn info(_: &File) -> Result<CtlrInfo> {
        bail!("DKIOCINFO is not supported on this platform");
    }

    pub fn media(_: &File) -> Result<MediaInfo> {
        bail!("DKIOCGMEDIAINFO is not supported on this platform");
    }

    pub fn geometry(_: &File) -> Result<Geometry> {
        bail!("DKIOCGGEOM is not supported on this platform");
    }

    pub fn removable(_: &File) -> Result<bool> {
        bail!("DKIOCREMOVABLE is not supported on this platform");
    }
}

pub use sys::{geometry, info, media, removable};

/**
 * Open a raw disk device without waiting for media to be present.
 */
pub fn open_raw(path: &str) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    std::fs::OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NDELAY)
        .open(path)
}
