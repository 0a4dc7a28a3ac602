/*
 * Copyright 2026 Oxide Computer Company
 */

//! The two fields of the UFS superblock needed to recover a last mount point.

use super::read_at;
use std::io::{Read, Seek};

pub const SBOFF: u64 = 8192;
pub const SBSIZE: usize = 8192;

const FS_MAGIC: u32 = 0x011954;
const MTB_UFS_MAGIC: u32 = 0xdecade;

const MAGIC_OFFSET: usize = 1372;
const FSMNT_OFFSET: usize = 212;
pub const MAXMNTLEN: usize = 512;

/**
 * Return the mount point recorded in a UFS superblock, or None if there is no
 * superblock or the recorded path is not absolute.
 */
pub fn last_mount<R: Read + Seek>(r: &mut R) -> std::io::Result<Option<String>> {
    let mut sb = vec![0u8; SBSIZE];
    if !read_at(r, SBOFF, &mut sb)? {
        return Ok(None);
    }

    let m = &sb[MAGIC_OFFSET..MAGIC_OFFSET + 4];
    let magic = u32::from_ne_bytes([m[0], m[1], m[2], m[3]]);
    if magic != FS_MAGIC && magic != MTB_UFS_MAGIC {
        return Ok(None);
    }

    let field = &sb[FSMNT_OFFSET..FSMNT_OFFSET + MAXMNTLEN];
    let len = match field.iter().position(|&b| b == 0) {
        Some(n) => n,
        /*
         * The field must be terminated within its bounds.
         */
        None => return Ok(None),
    };
    let path = String::from_utf8_lossy(&field[..len]);
    if !path.starts_with('/') {
        return Ok(None);
    }

    Ok(Some(path.into_owned()))
}
