/*
 * Copyright 2026 Oxide Computer Company
 */

//! Public attribute names and the constants carried in their values.
//!
//! Consumers match on these names as literal strings, so they must not change.

pub mod disk {
    pub const NAME: &str = "name";
    pub const VENDOR: &str = "vendor";
    pub const PRODUCT: &str = "product";
    pub const DEVID: &str = "devid";
    pub const CTYPE: &str = "ctype";
    pub const BTYPE: &str = "btype";
    pub const MTYPE: &str = "mtype";
    pub const BLOCKSIZE: &str = "blocksize";
    pub const SIZE: &str = "size";
    pub const REMOVABLE: &str = "removable";
    pub const LOADED: &str = "loaded";
    pub const LABEL: &str = "label";
    pub const CURRBOOT: &str = "currboot";
    pub const NHEADS: &str = "nheads";
    pub const NSECTORS: &str = "nsectors";
    pub const STATUS: &str = "status";

    /*
     * Bits of the "label" value.  A disk with no recognised label carries
     * LABEL_NONE alone.
     */
    pub const LABEL_NONE: u32 = 0;
    pub const LABEL_VTOC: u32 = 0x1;
    pub const LABEL_GPT: u32 = 0x2;
    pub const LABEL_FDISK: u32 = 0x4;

    pub const UNKNOWN: &str = "unknown";
}

pub mod part {
    pub const NAME: &str = "name";
    pub const BOOTID: &str = "bootid";
    pub const TYPE: &str = "type";
    pub const PART_TYPE: &str = "part_type";
    pub const START: &str = "start";
    pub const SIZE: &str = "size";
    pub const CONTENT: &str = "content";

    pub const PRIMARY: u32 = 0;
    pub const EXTENDED: u32 = 1;
    pub const LOGICAL: u32 = 2;

    pub const CONTENT_UNKNOWN: u32 = 0;
    pub const CONTENT_LSWAP: u32 = 1;
}

pub mod slice {
    pub const NAME: &str = "name";
    pub const INDEX: &str = "index";
    pub const DEVT: &str = "devt";
    pub const START: &str = "start";
    pub const SIZE: &str = "size";
    pub const TAG: &str = "tag";
    pub const FLAG: &str = "flag";
    pub const DEVID: &str = "devid";
    pub const LASTMNT: &str = "lastmnt";
    pub const INUSE: &str = "inuse";
    pub const USEDBY: &str = "usedby";
}

pub mod os {
    pub const SLICE_NAME: &str = "slice_name";
}

pub mod zpool {
    pub const NAME: &str = "name";
    pub const GUID: &str = "guid";
    pub const HEALTH: &str = "health";
    pub const STATUS: &str = "status";
    pub const SIZE: &str = "size";
    pub const CAPACITY: &str = "capacity";
    pub const VERSION: &str = "version";
    pub const BOOTFS: &str = "bootfs";
    pub const IMPORT: &str = "import";
    pub const NUM_TARGETS: &str = "num_targets";
    pub const TARGETS: &str = "targets";
    pub const NUM_LOGS: &str = "num_logs";
    pub const LOGS: &str = "logs";
    pub const NUM_L2CACHE: &str = "num_l2cache";
    pub const L2CACHE: &str = "l2cache";
    pub const NUM_SPARES: &str = "num_spares";
    pub const SPARES: &str = "spares";

    /*
     * Keys of a target (vdev) bag, alongside NAME, HEALTH, NUM_TARGETS and
     * TARGETS.
     */
    pub const READ_ERRORS: &str = "read_errors";
    pub const WRITE_ERRORS: &str = "write_errors";
    pub const CHECKSUM_ERRORS: &str = "checksum_errors";

    pub const SPARE_AVAIL: &str = "AVAIL";
    pub const SPARE_INUSE: &str = "INUSE";
}

pub mod progress {
    pub const MS_NUM: &str = "ms_num";
    pub const MS_CURR: &str = "ms_curr";
    pub const MS_PERC_DONE: &str = "ms_perc_done";
    pub const MS_PERC: &str = "ms_perc";
    pub const ERROR: &str = "error";
}

pub mod ti {
    pub const TARGET_TYPE: &str = "target_type";

    /* fdisk */
    pub const DISK_NAME: &str = "disk_name";
    pub const WHOLE_DISK: &str = "whole_disk";
    pub const IDS: &str = "ids";
    pub const ACTIVE: &str = "active";
    pub const BHEADS: &str = "bheads";
    pub const BSECTS: &str = "bsects";
    pub const BCYLS: &str = "bcyls";
    pub const EHEADS: &str = "eheads";
    pub const ESECTS: &str = "esects";
    pub const ECYLS: &str = "ecyls";
    pub const RSECTS: &str = "rsects";
    pub const NUMSECTS: &str = "numsects";

    /* VTOC */
    pub const DEFAULT_LAYOUT: &str = "default_layout";
    pub const PARTS: &str = "parts";
    pub const TAGS: &str = "tags";
    pub const FLAGS: &str = "flags";
    pub const FIRST_SECTORS: &str = "first_sectors";
    pub const SIZES: &str = "sizes";

    /* ZFS */
    pub const RPOOL_NAME: &str = "rpool_name";
    pub const DEVICE: &str = "device";
    pub const BOOTFS: &str = "bootfs";
    pub const POOL_NAME: &str = "pool_name";
    pub const NUM: &str = "num";
    pub const NAMES: &str = "names";
    pub const PROPERTIES: &str = "properties";
    pub const MB_SIZES: &str = "mb_sizes";
    pub const TYPES: &str = "types";

    /* boot environments */
    pub const BE_NAME: &str = "be_name";
    pub const FS_NAMES: &str = "fs_names";
    pub const SHARED_FS_NAMES: &str = "shared_fs_names";

    /* ramdisk and directory */
    pub const BOOTARCH_NAME: &str = "bootarch_name";
    pub const DEST: &str = "dest";
    pub const FS_TYPE: &str = "fs_type";
    pub const SIZE_KB: &str = "size_kb";
    pub const RELEASE: &str = "release";
}

/**
 * VTOC slice tags and flags, as written by fmthard(1M).
 */
pub mod vtoc {
    pub const V_UNASSIGNED: u32 = 0x00;
    pub const V_BOOT: u32 = 0x01;
    pub const V_ROOT: u32 = 0x02;
    pub const V_SWAP: u32 = 0x03;
    pub const V_USR: u32 = 0x04;
    pub const V_BACKUP: u32 = 0x05;
    pub const V_STAND: u32 = 0x06;
    pub const V_VAR: u32 = 0x07;
    pub const V_HOME: u32 = 0x08;
    pub const V_ALTSCTR: u32 = 0x09;
    pub const V_CACHE: u32 = 0x0a;
    pub const V_RESERVED: u32 = 0x0b;

    pub const V_UNMNT: u32 = 0x01;
    pub const V_RONLY: u32 = 0x10;

    pub const NUMPART: u32 = 16;
    pub const BACKUP_SLICE: u32 = 2;
}

/**
 * fdisk partition identifiers and flags.
 */
pub mod fdisk {
    pub const FD_NUMPART: usize = 4;
    pub const ACTIVE: u32 = 0x80;

    pub const EXTDOS: u32 = 0x05;
    pub const FDISK_EXTLBA: u32 = 0x0f;
    pub const EXTLINUX: u32 = 0x85;
    pub const SUNIXOS: u32 = 0x82;
    pub const SUNIXOS2: u32 = 0xbf;
    pub const EFI_PMBR: u32 = 0xee;

    pub const MAX_CYL: u32 = 1023;

    pub fn is_extended(id: u32) -> bool {
        matches!(id, EXTDOS | FDISK_EXTLBA | EXTLINUX)
    }
}
