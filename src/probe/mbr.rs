/*
 * Copyright 2026 Oxide Computer Company
 */

//! x86 master boot record and extended partition chain.

use super::{le32, read_at};
use crate::keys::fdisk::{is_extended, EFI_PMBR, FD_NUMPART};
use anyhow::{bail, Result};
use std::io::{Read, Seek};

pub const SECTOR: usize = 512;
const SIGNATURE_OFFSET: usize = 510;
const TABLE_OFFSET: usize = 446;
const ENTRY_SIZE: usize = 16;
const MAX_LOGICAL: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entry {
    pub bootid: u32,
    pub bhead: u32,
    pub bsect: u32,
    pub bcyl: u32,
    pub id: u32,
    pub ehead: u32,
    pub esect: u32,
    pub ecyl: u32,
    pub relsect: u32,
    pub numsect: u32,
}

impl Entry {
    fn decode(b: &[u8]) -> Entry {
        /*
         * The top two bits of each sector byte are bits 8 and 9 of the
         * cylinder.
         */
        Entry {
            bootid: b[0] as u32,
            bhead: b[1] as u32,
            bsect: (b[2] & 0x3f) as u32,
            bcyl: b[3] as u32 | (((b[2] & 0xc0) as u32) << 2),
            id: b[4] as u32,
            ehead: b[5] as u32,
            esect: (b[6] & 0x3f) as u32,
            ecyl: b[7] as u32 | (((b[6] & 0xc0) as u32) << 2),
            relsect: le32(b, 8),
            numsect: le32(b, 12),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id == 0 || self.numsect == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Primary,
    Extended,
    Logical,
}

/**
 * A partition found on the disk.  "relsect" in the entry is an absolute sector
 * number for every kind, including logical partitions.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub number: u32,
    pub kind: Kind,
    pub entry: Entry,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub efi: bool,
    pub partitions: Vec<Partition>,
}

fn read_sector<R: Read + Seek>(r: &mut R, lba: u64) -> Result<Option<[u8; SECTOR]>> {
    let mut buf = [0u8; SECTOR];
    if !read_at(r, lba * SECTOR as u64, &mut buf)? {
        return Ok(None);
    }
    if buf[SIGNATURE_OFFSET] != 0x55 || buf[SIGNATURE_OFFSET + 1] != 0xaa {
        return Ok(None);
    }
    Ok(Some(buf))
}

fn entries(buf: &[u8; SECTOR]) -> [Entry; FD_NUMPART] {
    let mut out = [Entry::default(); FD_NUMPART];
    for (i, e) in out.iter_mut().enumerate() {
        let o = TABLE_OFFSET + i * ENTRY_SIZE;
        *e = Entry::decode(&buf[o..o + ENTRY_SIZE]);
    }
    out
}

/**
 * Read the partition table from the start of a whole-disk device.  Returns None
 * if the first sector carries no boot signature.
 */
pub fn read_table<R: Read + Seek>(r: &mut R) -> Result<Option<Table>> {
    let mbr = match read_sector(r, 0)? {
        Some(b) => b,
        None => return Ok(None),
    };

    let mut t = Table::default();
    let mut ext = None;

    for (i, e) in entries(&mbr).iter().enumerate() {
        if e.id == EFI_PMBR {
            t.efi = true;
        }
        if e.is_empty() {
            continue;
        }
        let kind = if is_extended(e.id) {
            if ext.is_some() {
                bail!("more than one extended partition");
            }
            ext = Some(e.relsect);
            Kind::Extended
        } else {
            Kind::Primary
        };
        t.partitions.push(Partition { number: i as u32 + 1, kind, entry: *e });
    }

    if let Some(base) = ext {
        logicals(r, base, &mut t.partitions)?;
    }

    Ok(Some(t))
}

/*
 * Walk the chain of extended boot records.  In each record the first entry is
 * a logical partition relative to that record, and the second points at the
 * next record relative to the start of the extended partition.
 */
fn logicals<R: Read + Seek>(
    r: &mut R,
    base: u32,
    out: &mut Vec<Partition>,
) -> Result<()> {
    let mut ebr = base as u64;
    let mut number = FD_NUMPART as u32 + 1;

    for _ in 0..MAX_LOGICAL {
        let buf = match read_sector(r, ebr)? {
            Some(b) => b,
            None => break,
        };
        let e = entries(&buf);

        if !e[0].is_empty() {
            let mut entry = e[0];
            entry.relsect = match u32::try_from(ebr).ok()
                .and_then(|s| s.checked_add(entry.relsect))
            {
                Some(start) => start,
                None => bail!("logical partition at {}+{} is past the \
                    32-bit sector range", ebr, entry.relsect),
            };
            out.push(Partition { number, kind: Kind::Logical, entry });
            number += 1;
        }

        if e[1].is_empty() || !is_extended(e[1].id) {
            break;
        }
        let next = base as u64 + e[1].relsect as u64;
        if next <= ebr {
            bail!("extended partition chain loops at sector {}", next);
        }
        ebr = next;
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use std::io::Cursor;

    pub(crate) fn put(img: &mut [u8], sector: u64, slot: usize, e: &Entry) {
        let o = sector as usize * SECTOR + TABLE_OFFSET + slot * ENTRY_SIZE;
        img[o] = e.bootid as u8;
        img[o + 1] = e.bhead as u8;
        img[o + 2] = (e.bsect as u8 & 0x3f) | (((e.bcyl >> 2) & 0xc0) as u8);
        img[o + 3] = e.bcyl as u8;
        img[o + 4] = e.id as u8;
        img[o + 5] = e.ehead as u8;
        img[o + 6] = (e.esect as u8 & 0x3f) | (((e.ecyl >> 2) & 0xc0) as u8);
        img[o + 7] = e.ecyl as u8;
        img[o + 8..o + 12].copy_from_slice(&e.relsect.to_le_bytes());
        img[o + 12..o + 16].copy_from_slice(&e.numsect.to_le_bytes());
        let s = sector as usize * SECTOR + SIGNATURE_OFFSET;
        img[s] = 0x55;
        img[s + 1] = 0xaa;
    }

    fn entry(id: u32, relsect: u32, numsect: u32) -> Entry {
        Entry { id, relsect, numsect, ..Default::default() }
    }

    #[test]
    fn no_signature() -> Result<()> {
        let img = vec![0u8; 4096];
        assert_eq!(read_table(&mut Cursor::new(img))?, None);
        Ok(())
    }

    #[test]
    fn primaries_and_cylinder_bits() -> Result<()> {
        let mut img = vec![0u8; SECTOR * 4];
        let solaris = Entry {
            bootid: 0x80,
            bhead: 1,
            bsect: 1,
            bcyl: 0,
            id: 0xbf,
            ehead: 254,
            esect: 63,
            ecyl: 1023,
            relsect: 63,
            numsect: 83875302,
        };
        put(&mut img, 0, 0, &solaris);
        put(&mut img, 0, 2, &entry(0x82, 83875365, 10000));

        let t = read_table(&mut Cursor::new(img))?.unwrap();
        println!("{:#?}", t);
        assert!(!t.efi);
        assert_eq!(t.partitions.len(), 2);
        assert_eq!(t.partitions[0].entry, solaris);
        assert_eq!(t.partitions[0].kind, Kind::Primary);
        assert_eq!(t.partitions[1].number, 3);
        Ok(())
    }

    #[test]
    fn extended_chain() -> Result<()> {
        let mut img = vec![0u8; SECTOR * 64];
        put(&mut img, 0, 0, &entry(0x83, 1, 9));
        put(&mut img, 0, 1, &entry(0x05, 10, 50));
        /* first EBR at 10: logical at 10+2, next EBR at 10+20 */
        put(&mut img, 10, 0, &entry(0x82, 2, 8));
        put(&mut img, 10, 1, &entry(0x05, 20, 20));
        /* second EBR at 30: logical at 30+1, end of chain */
        put(&mut img, 30, 0, &entry(0x07, 1, 15));

        let t = read_table(&mut Cursor::new(img))?.unwrap();
        println!("{:#?}", t);
        let got: Vec<_> = t.partitions.iter()
            .map(|p| (p.number, p.kind, p.entry.id, p.entry.relsect))
            .collect();
        assert_eq!(got, vec![
            (1, Kind::Primary, 0x83, 1),
            (2, Kind::Extended, 0x05, 10),
            (5, Kind::Logical, 0x82, 12),
            (6, Kind::Logical, 0x07, 31),
        ]);
        Ok(())
    }

    #[test]
    fn logical_past_sector_range() {
        let mut img = vec![0u8; SECTOR * 16];
        put(&mut img, 0, 0, &entry(0x05, 10, 5));
        put(&mut img, 10, 0, &entry(0x83, u32::MAX - 4, 8));
        assert!(read_table(&mut Cursor::new(img)).is_err());
    }

    #[test]
    fn protective_mbr_marks_efi() -> Result<()> {
        let mut img = vec![0u8; SECTOR * 2];
        put(&mut img, 0, 0, &entry(0xee, 1, u32::MAX));
        let t = read_table(&mut Cursor::new(img))?.unwrap();
        assert!(t.efi);
        Ok(())
    }
}
