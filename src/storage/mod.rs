/*
 * Copyright 2026 Oxide Computer Company
 */

//! Storage enumeration: drives, fdisk partitions and VTOC slices as reported
//! by a storage provider, in the provider's attribute namespace.

pub mod dkio;
pub mod dm;
pub mod host;

use crate::attrs::{AttrList, Optional};
use crate::common::*;
use dm::MediaType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    Drive,
    Partition,
    Slice,
    Controller,
    Bus,
}

/**
 * An opaque identifier for something the provider reported.  It remains
 * meaningful for as long as the list that contained it is held.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub kind: DescriptorKind,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub handle: Handle,
    /**
     * For drives, the device path or other provider-specific name; the ctds
     * name comes from alias().  For partitions and slices, the ctds name.
     */
    pub name: String,
    pub attrs: AttrList,
}

/**
 * Mirrored-root membership of a slice.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdInfo {
    pub inuse: String,
    pub usedby: String,
}

pub trait MdProbe: Send + Sync {
    fn probe(&self, slice: &str) -> Result<Option<MdInfo>>;
}

pub trait StorageProvider: Send + Sync {
    fn drives(&self) -> Result<Vec<Descriptor>>;

    fn partitions(&self, drive: &Descriptor) -> Result<Vec<Descriptor>>;

    /**
     * Slices within a drive or within a Solaris fdisk partition.  A disk
     * without a VTOC has no slices.
     */
    fn slices(&self, parent: &Descriptor) -> Result<Vec<Descriptor>>;

    fn controller(&self, drive: &Descriptor) -> Result<Option<Descriptor>>;

    fn bus(&self, drive: &Descriptor) -> Result<Option<Descriptor>>;

    /**
     * The ctds name by which a drive is known.
     */
    fn alias(&self, drive: &Descriptor) -> Result<Option<String>>;

    /**
     * The ctds name of the disk holding the running root file system.
     */
    fn boot_disk(&self) -> Result<Option<String>>;

    fn has_vtoc(&self, disk: &str) -> Result<bool>;

    /**
     * The mount point recorded in the UFS superblock of a slice.  Any failure
     * to read it is reported as None.
     */
    fn last_mount(&self, slice: &str) -> Option<String>;

    fn linux_swap(&self, partition: &str) -> bool;
}

/**
 * The drives reported by a provider.  Every drive is retained so that
 * per-drive queries keep working, while the public list omits removable
 * floppy and optical media and ZFS volumes.
 */
#[derive(Debug, Default)]
pub struct DriveList {
    all: Vec<Descriptor>,
    public: Vec<usize>,
}

impl DriveList {
    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.public.iter().map(|&i| &self.all[i])
    }

    pub fn len(&self) -> usize {
        self.public.len()
    }

    pub fn is_empty(&self) -> bool {
        self.public.is_empty()
    }

    pub fn all(&self) -> &[Descriptor] {
        &self.all
    }

    pub fn attributes(&self, h: Handle) -> Option<&AttrList> {
        self.all.iter().find(|d| d.handle == h).map(|d| &d.attrs)
    }
}

fn excluded(d: &Descriptor) -> Result<bool> {
    let mt = d.attrs.lookup_u32(dm::DM_MTYPE).optional()?;
    let mt = MediaType::from_u32(mt.unwrap_or(0));
    if mt == MediaType::Floppy || mt.is_optical() {
        return Ok(true);
    }

    let opath = d.attrs.lookup_string(dm::DM_OPATH).optional()?;
    Ok(opath.map(|p| p.starts_with("/dev/zvol/")).unwrap_or(false))
}

pub fn list_drives(log: &Logger, sp: &dyn StorageProvider) -> Result<DriveList> {
    let all = sp.drives()?;
    let mut public = Vec::new();
    for (i, d) in all.iter().enumerate() {
        if excluded(d)? {
            debug!(log, "skipping drive {}", d.name);
        } else {
            public.push(i);
        }
    }
    Ok(DriveList { all, public })
}

/**
 * Partitions of the given drive, or of every public drive.
 */
pub fn list_partitions(
    sp: &dyn StorageProvider,
    drives: &DriveList,
    drive: Option<&Descriptor>,
) -> Result<Vec<Descriptor>> {
    match drive {
        Some(d) => sp.partitions(d),
        None => {
            let mut out = Vec::new();
            for d in drives.iter() {
                out.extend(sp.partitions(d)?);
            }
            Ok(out)
        }
    }
}

/**
 * Slices of the given drive or partition, or of every public drive.
 */
pub fn list_slices(
    sp: &dyn StorageProvider,
    drives: &DriveList,
    parent: Option<&Descriptor>,
) -> Result<Vec<Descriptor>> {
    match parent {
        Some(p) => sp.slices(p),
        None => {
            let mut out = Vec::new();
            for d in drives.iter() {
                out.extend(sp.slices(d)?);
            }
            Ok(out)
        }
    }
}
