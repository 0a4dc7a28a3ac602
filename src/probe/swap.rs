/*
 * Copyright 2026 Oxide Computer Company
 */

//! Linux swap signature detection.

use super::read_at;
use std::io::{Read, Seek};

const MAGIC_V0: &[u8] = b"SWAP-SPACE";
const MAGIC_V1: &[u8] = b"SWAPSPACE";
const MAGIC_LEN: usize = 10;

const MIN_PAGE: u64 = 4 * 1024;
const MAX_PAGE: u64 = 8 * 1024 * 1024;
const THIRD_BLOCK: u64 = 1024;

fn is_magic(buf: &[u8]) -> bool {
    buf.starts_with(MAGIC_V0) || buf.starts_with(MAGIC_V1)
}

/**
 * Look for a Linux swap signature at the end of the first page, for each
 * power-of-two page size from 4 KiB to 8 MiB, and then at byte 1024.
 */
pub fn is_linux_swap<R: Read + Seek>(r: &mut R) -> std::io::Result<bool> {
    let mut buf = [0u8; MAGIC_LEN];

    let mut page = MIN_PAGE;
    while page <= MAX_PAGE {
        if read_at(r, page - MAGIC_LEN as u64, &mut buf)? && is_magic(&buf) {
            return Ok(true);
        }
        page *= 2;
    }

    Ok(read_at(r, THIRD_BLOCK, &mut buf)? && is_magic(&buf))
}
