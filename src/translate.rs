/*
 * Copyright 2026 Oxide Computer Company
 */

//! Conversion of storage provider attributes into the public attribute names,
//! and the attributes synthesized from other sources.

use crate::attrs::{AttrList, AttrValue, Optional};
use crate::common::*;
use crate::keys;
use crate::keys::fdisk::{is_extended, FD_NUMPART, SUNIXOS};
use crate::names;
use crate::storage::dm::*;
use crate::storage::{Descriptor, MdProbe, StorageProvider};

pub struct Translation {
    pub host: &'static str,
    pub core: &'static str,
}

const fn t(host: &'static str, core: &'static str) -> Translation {
    Translation { host, core }
}

pub static DRIVE: &[Translation] = &[
    t(DM_VENDOR_ID, keys::disk::VENDOR),
    t(DM_PRODUCT_ID, keys::disk::PRODUCT),
    t(DM_DEVID, keys::disk::DEVID),
    t(DM_MTYPE, keys::disk::MTYPE),
    t(DM_BLOCKSIZE, keys::disk::BLOCKSIZE),
    t(DM_SIZE, keys::disk::SIZE),
    t(DM_REMOVABLE, keys::disk::REMOVABLE),
    t(DM_LOADED, keys::disk::LOADED),
    t(DM_NHEADS, keys::disk::NHEADS),
    t(DM_NSECTORS, keys::disk::NSECTORS),
    t(DM_STATUS, keys::disk::STATUS),
];

pub static PARTITION: &[Translation] = &[
    t(DM_BOOTID, keys::part::BOOTID),
    t(DM_PTYPE, keys::part::TYPE),
    t(DM_RELSECT, keys::part::START),
    t(DM_NSECTORS, keys::part::SIZE),
];

pub static SLICE: &[Translation] = &[
    t(DM_INDEX, keys::slice::INDEX),
    t(DM_DEVT, keys::slice::DEVT),
    t(DM_START, keys::slice::START),
    t(DM_SIZE, keys::slice::SIZE),
    t(DM_TAG, keys::slice::TAG),
    t(DM_FLAG, keys::slice::FLAG),
    t(DM_DEVID, keys::slice::DEVID),
];

/**
 * Copy each attribute named in the table into a new list under its public
 * name, preserving its type.  Attributes not in the table are dropped, as are
 * nested lists, which no table describes.
 */
pub fn translate(log: &Logger, table: &[Translation], input: &AttrList)
    -> Result<AttrList>
{
    let mut out = AttrList::new();
    for p in input {
        let Some(tr) = table.iter().find(|tr| tr.host == p.name()) else {
            continue;
        };
        if let AttrValue::ListArray(_) = p.value() {
            debug!(log, "attribute {} has unsupported type {}",
                p.name(), p.attr_type());
            continue;
        }
        out.add(tr.core, p.value().clone())?;
    }
    Ok(out)
}

/**
 * Translate drive attributes, supplying "unknown" for a missing vendor.
 */
pub fn drive(log: &Logger, input: &AttrList) -> Result<AttrList> {
    let mut out = translate(log, DRIVE, input)?;
    if !out.has(keys::disk::VENDOR) {
        out.add_string(keys::disk::VENDOR, keys::disk::UNKNOWN)?;
    }
    Ok(out)
}

fn type_of(d: Option<Descriptor>, key: &str) -> Result<String> {
    Ok(match d {
        Some(d) => d.attrs.lookup_string(key).optional()?
            .unwrap_or(keys::disk::UNKNOWN)
            .to_string(),
        None => keys::disk::UNKNOWN.to_string(),
    })
}

/**
 * Produce the public attributes of a drive: the translated provider
 * attributes plus name, controller and bus type, label kind, and the
 * current boot disk marker.
 */
pub fn synthesize_drive(
    log: &Logger,
    sp: &dyn StorageProvider,
    d: &Descriptor,
    boot_disk: Option<&str>,
) -> Result<AttrList> {
    let mut out = drive(log, &d.attrs)?;

    let name = match sp.alias(d)? {
        Some(n) => n,
        None => d.name.clone(),
    };
    out.set(keys::disk::NAME, AttrValue::String(name.clone()));

    out.add_string(keys::disk::CTYPE, &type_of(sp.controller(d)?, DM_CTYPE)?)?;
    out.add_string(keys::disk::BTYPE, &type_of(sp.bus(d)?, DM_BTYPE)?)?;

    let mut label = keys::disk::LABEL_NONE;
    if d.attrs.lookup_bool(DM_EFI).optional()?.unwrap_or(false) {
        label |= keys::disk::LABEL_GPT;
    }
    if d.attrs.lookup_bool(DM_FDISK).optional()?.unwrap_or(false) {
        label |= keys::disk::LABEL_FDISK;
    }
    if sp.has_vtoc(&name)? {
        label |= keys::disk::LABEL_VTOC;
    }
    out.add_u32(keys::disk::LABEL, label)?;

    if boot_disk == Some(name.as_str()) {
        out.add_bool(keys::disk::CURRBOOT, true)?;
    }

    Ok(out)
}

/**
 * Produce the public attributes of an fdisk partition, classifying it as
 * primary, extended or logical and checking Solaris-id partitions for Linux
 * swap.
 */
pub fn synthesize_partition(
    log: &Logger,
    sp: &dyn StorageProvider,
    d: &Descriptor,
) -> Result<AttrList> {
    let mut out = translate(log, PARTITION, &d.attrs)?;
    out.add_string(keys::part::NAME, &d.name)?;

    let id = out.lookup_u32(keys::part::TYPE).optional()?.unwrap_or(0);
    let number = names::partition_number(&d.name).unwrap_or(0);
    let part_type = if number as usize > FD_NUMPART {
        keys::part::LOGICAL
    } else if is_extended(id) {
        keys::part::EXTENDED
    } else {
        keys::part::PRIMARY
    };
    out.add_u32(keys::part::PART_TYPE, part_type)?;

    let content = if id == SUNIXOS && sp.linux_swap(&d.name) {
        keys::part::CONTENT_LSWAP
    } else {
        keys::part::CONTENT_UNKNOWN
    };
    out.add_u32(keys::part::CONTENT, content)?;

    Ok(out)
}

/**
 * Produce the public attributes of a slice, with its last UFS mount point and
 * any mirrored-root membership.
 */
pub fn synthesize_slice(
    log: &Logger,
    sp: &dyn StorageProvider,
    md: Option<&dyn MdProbe>,
    d: &Descriptor,
) -> Result<AttrList> {
    let mut out = translate(log, SLICE, &d.attrs)?;
    out.add_string(keys::slice::NAME, &d.name)?;

    let lastmnt = sp.last_mount(&d.name).unwrap_or_default();
    out.add_string(keys::slice::LASTMNT, &lastmnt)?;

    if let Some(md) = md {
        if let Some(mi) = md.probe(&d.name)? {
            out.add_string(keys::slice::INUSE, &mi.inuse)?;
            out.add_string(keys::slice::USEDBY, &mi.usedby)?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::attrs::AttrType;
    use crate::fakes::storage::{FakeDrive, FakePartition, FakeSlice, FakeStorage};
    use crate::storage::MdInfo;

    fn log() -> Logger {
        crate::logging::sink_log(|_, _, _| {})
    }

    #[test]
    fn translation_preserves_types() -> Result<()> {
        let mut input = AttrList::new();
        input.add_string(DM_VENDOR_ID, "ATA")?;
        input.add_u32(DM_BLOCKSIZE, 512)?;
        input.add_u64(DM_SIZE, 83886080)?;
        input.add_bool(DM_REMOVABLE, false)?;
        input.add_u32_array(DM_NHEADS, &[255])?;
        input.add_string(DM_OPATH, "/dev/rdsk/c0t0d0p0")?;
        input.add_list_array(DM_STATUS, vec![AttrList::new()])?;

        let out = translate(&log(), DRIVE, &input)?;
        println!("{:#?}", out);

        for tr in DRIVE {
            if let (Some(a), Some(b)) = (input.lookup(tr.host), out.lookup(tr.core)) {
                assert_eq!(a.attr_type(), b.attr_type());
                assert_eq!(a, b);
            }
        }
        assert_eq!(out.lookup(keys::disk::NHEADS).unwrap().attr_type(),
            AttrType::U32Array);
        assert!(!out.has(DM_OPATH));
        assert!(!out.has(keys::disk::STATUS));
        assert_eq!(out.len(), 5);
        Ok(())
    }

    #[test]
    fn missing_vendor_becomes_unknown() -> Result<()> {
        let mut input = AttrList::new();
        input.add_string(DM_PRODUCT_ID, "VBOX HARDDISK")?;
        input.add_u32(DM_BLOCKSIZE, 512)?;
        input.add_u64(DM_SIZE, 83886080)?;

        let out = drive(&log(), &input)?;
        let mut expect = translate(&log(), DRIVE, &input)?;
        expect.add_string(keys::disk::VENDOR, "unknown")?;
        assert_eq!(out, expect);
        assert_eq!(out.lookup_string(keys::disk::VENDOR)?, "unknown");
        assert_eq!(input.len(), 3);
        Ok(())
    }

    #[test]
    fn drive_synthesis() -> Result<()> {
        let sp = FakeStorage::new()
            .drive(FakeDrive::new("c0t0d0").fdisk(true).vtoc(true)
                .ctype("ata").btype("pci"))
            .drive(FakeDrive::new("c1t0d0").efi(true));

        let drives = sp.drives()?;
        let a = synthesize_drive(&log(), &sp, &drives[0], Some("c0t0d0"))?;
        println!("{:#?}", a);
        assert_eq!(a.lookup_string(keys::disk::NAME)?, "c0t0d0");
        assert_eq!(a.lookup_string(keys::disk::CTYPE)?, "ata");
        assert_eq!(a.lookup_string(keys::disk::BTYPE)?, "pci");
        assert_eq!(a.lookup_u32(keys::disk::LABEL)?,
            keys::disk::LABEL_VTOC | keys::disk::LABEL_FDISK);
        assert!(a.lookup_bool(keys::disk::CURRBOOT)?);

        let b = synthesize_drive(&log(), &sp, &drives[1], Some("c0t0d0"))?;
        assert_eq!(b.lookup_string(keys::disk::CTYPE)?, "unknown");
        assert_eq!(b.lookup_string(keys::disk::BTYPE)?, "unknown");
        assert_eq!(b.lookup_u32(keys::disk::LABEL)?, keys::disk::LABEL_GPT);
        assert!(!b.has(keys::disk::CURRBOOT));
        Ok(())
    }

    #[test]
    fn partition_kinds_and_swap() -> Result<()> {
        let sp = FakeStorage::new().drive(FakeDrive::new("c0t0d0")
            .partition(FakePartition::new(1, 0x82, 63, 1000).swap(true))
            .partition(FakePartition::new(2, 0x82, 1063, 1000))
            .partition(FakePartition::new(3, 0x0f, 2063, 5000))
            .partition(FakePartition::new(5, 0x83, 2064, 1000).swap(true)));

        let drives = sp.drives()?;
        let parts = sp.partitions(&drives[0])?;
        let got = parts.iter()
            .map(|p| {
                let a = synthesize_partition(&log(), &sp, p)?;
                Ok((
                    a.lookup_string(keys::part::NAME)?.to_string(),
                    a.lookup_u32(keys::part::PART_TYPE)?,
                    a.lookup_u32(keys::part::CONTENT)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(got, vec![
            ("c0t0d0p1".to_string(), keys::part::PRIMARY, keys::part::CONTENT_LSWAP),
            ("c0t0d0p2".to_string(), keys::part::PRIMARY, keys::part::CONTENT_UNKNOWN),
            ("c0t0d0p3".to_string(), keys::part::EXTENDED, keys::part::CONTENT_UNKNOWN),
            ("c0t0d0p5".to_string(), keys::part::LOGICAL, keys::part::CONTENT_UNKNOWN),
        ]);
        Ok(())
    }

    struct Mirror;

    impl MdProbe for Mirror {
        fn probe(&self, slice: &str) -> Result<Option<MdInfo>> {
            Ok((slice == "c0t0d0s0").then(|| MdInfo {
                inuse: "mdb".into(),
                usedby: "d10".into(),
            }))
        }
    }

    #[test]
    fn slice_synthesis() -> Result<()> {
        let sp = FakeStorage::new().drive(FakeDrive::new("c0t0d0")
            .slice(FakeSlice::new(0, 2, 16065, 83859300).last_mount("/"))
            .slice(FakeSlice::new(2, 5, 0, 83875365)));

        let drives = sp.drives()?;
        let slices = sp.slices(&drives[0])?;

        let s0 = synthesize_slice(&log(), &sp, Some(&Mirror), &slices[0])?;
        println!("{:#?}", s0);
        assert_eq!(s0.lookup_string(keys::slice::LASTMNT)?, "/");
        assert_eq!(s0.lookup_string(keys::slice::USEDBY)?, "d10");
        assert_eq!(s0.lookup_u64(keys::slice::SIZE)?, 83859300);

        let s2 = synthesize_slice(&log(), &sp, None, &slices[1])?;
        assert_eq!(s2.lookup_string(keys::slice::LASTMNT)?, "");
        assert!(!s2.has(keys::slice::INUSE));
        Ok(())
    }
}
