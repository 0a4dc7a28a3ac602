/*
 * Copyright 2026 Oxide Computer Company
 */

//! Readers for on-disk metadata.  Each probe works on any `Read + Seek` source
//! so that it can be pointed at a raw device or at a test image.

pub mod mbr;
pub mod swap;
pub mod ufs;
pub mod vtoc;

use std::io::{ErrorKind, Read, Seek, SeekFrom};

/**
 * Read exactly buf.len() bytes at the given offset.  Returns false, rather than
 * an error, if the source ends first.
 */
pub(crate) fn read_at<R: Read + Seek>(
    r: &mut R,
    offset: u64,
    buf: &mut [u8],
) -> std::io::Result<bool> {
    r.seek(SeekFrom::Start(offset))?;
    match r.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

pub(crate) fn le32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}
