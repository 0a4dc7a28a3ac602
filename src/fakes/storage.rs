/*
 * Copyright 2026 Oxide Computer Company
 */

//! A storage provider built from a description of drives.

use crate::attrs::{AttrList, AttrValue};
use crate::common::*;
use crate::keys::fdisk::{SUNIXOS, SUNIXOS2};
use crate::names;
use crate::storage::dm::*;
use crate::storage::{Descriptor, DescriptorKind, Handle, StorageProvider};

#[derive(Clone)]
pub struct FakePartition {
    number: u32,
    id: u32,
    bootid: u32,
    relsect: u32,
    numsect: u32,
    swap: bool,
}

impl FakePartition {
    pub fn new(number: u32, id: u32, relsect: u32, numsect: u32) -> Self {
        FakePartition { number, id, bootid: 0, relsect, numsect, swap: false }
    }

    pub fn active(mut self) -> Self {
        self.bootid = 0x80;
        self
    }

    pub fn swap(mut self, swap: bool) -> Self {
        self.swap = swap;
        self
    }
}

#[derive(Clone)]
pub struct FakeSlice {
    index: u32,
    tag: u32,
    flag: u32,
    start: u64,
    size: u64,
    last_mount: Option<String>,
}

impl FakeSlice {
    pub fn new(index: u32, tag: u32, start: u64, size: u64) -> Self {
        FakeSlice { index, tag, flag: 0, start, size, last_mount: None }
    }

    pub fn flag(mut self, flag: u32) -> Self {
        self.flag = flag;
        self
    }

    pub fn last_mount(mut self, m: &str) -> Self {
        self.last_mount = Some(m.to_string());
        self
    }
}

#[derive(Clone)]
pub struct FakeDrive {
    name: String,
    attrs: AttrList,
    ctype: Option<String>,
    btype: Option<String>,
    vtoc: bool,
    partitions: Vec<FakePartition>,
    slices: Vec<FakeSlice>,
}

impl FakeDrive {
    /**
     * A 40 GB fixed disk with 512 byte blocks and 255/63 geometry.
     */
    pub fn new(name: &str) -> Self {
        let mut a = AttrList::new();
        a.set(DM_VENDOR_ID, AttrValue::String("ATA".into()));
        a.set(DM_PRODUCT_ID, AttrValue::String("VBOX HARDDISK".into()));
        a.set(DM_DEVID, AttrValue::String(format!("id1,sd@A{}", name)));
        a.set(DM_OPATH, AttrValue::String(format!("/dev/rdsk/{}p0", name)));
        a.set(DM_MTYPE, AttrValue::U32(MediaType::Fixed as u32));
        a.set(DM_BLOCKSIZE, AttrValue::U32(512));
        a.set(DM_SIZE, AttrValue::U64(83886080));
        a.set(DM_REMOVABLE, AttrValue::Bool(false));
        a.set(DM_LOADED, AttrValue::Bool(true));
        a.set(DM_NHEADS, AttrValue::U32(255));
        a.set(DM_NSECTORS, AttrValue::U32(63));
        a.set(DM_STATUS, AttrValue::U32(DM_DRIVE_UP));
        a.set(DM_FDISK, AttrValue::Bool(false));
        a.set(DM_EFI, AttrValue::Bool(false));

        FakeDrive {
            name: name.to_string(),
            attrs: a,
            ctype: None,
            btype: None,
            vtoc: false,
            partitions: Vec::new(),
            slices: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, v: AttrValue) -> Self {
        self.attrs.set(name, v);
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.attrs.remove(name);
        self
    }

    pub fn mtype(self, mt: MediaType) -> Self {
        self.attr(DM_MTYPE, AttrValue::U32(mt as u32))
    }

    pub fn opath(self, p: &str) -> Self {
        self.attr(DM_OPATH, AttrValue::String(p.into()))
    }

    pub fn blocksize(self, bs: u32) -> Self {
        self.attr(DM_BLOCKSIZE, AttrValue::U32(bs))
    }

    pub fn size(self, blocks: u64) -> Self {
        self.attr(DM_SIZE, AttrValue::U64(blocks))
    }

    pub fn fdisk(self, on: bool) -> Self {
        self.attr(DM_FDISK, AttrValue::Bool(on))
    }

    pub fn efi(self, on: bool) -> Self {
        self.attr(DM_EFI, AttrValue::Bool(on))
    }

    pub fn vtoc(mut self, on: bool) -> Self {
        self.vtoc = on;
        self
    }

    pub fn ctype(mut self, c: &str) -> Self {
        self.ctype = Some(c.to_string());
        self
    }

    pub fn btype(mut self, b: &str) -> Self {
        self.btype = Some(b.to_string());
        self
    }

    pub fn partition(mut self, p: FakePartition) -> Self {
        self.partitions.push(p);
        self.fdisk(true)
    }

    pub fn slice(mut self, s: FakeSlice) -> Self {
        self.slices.push(s);
        self.vtoc = true;
        self
    }
}

#[derive(Default)]
pub struct FakeStorage {
    drives: Vec<FakeDrive>,
    boot: Option<String>,
}

impl FakeStorage {
    pub fn new() -> Self {
        FakeStorage::default()
    }

    pub fn drive(mut self, d: FakeDrive) -> Self {
        self.drives.push(d);
        self
    }

    pub fn boot_disk(mut self, name: &str) -> Self {
        self.boot = Some(name.to_string());
        self
    }

    fn find(&self, disk: &str) -> Option<(usize, &FakeDrive)> {
        self.drives.iter().enumerate().find(|(_, d)| d.name == disk)
    }

    fn slice(&self, name: &str) -> Option<&FakeSlice> {
        let idx = names::slice_index(name)?;
        let (_, d) = self.find(names::disk_name(name))?;
        d.slices.iter().find(|s| s.index == idx)
    }

    fn slices_of(&self, di: usize, d: &FakeDrive) -> Result<Vec<Descriptor>> {
        let mut out = Vec::new();
        for s in d.slices.iter() {
            let mut a = AttrList::new();
            a.add_u32(DM_INDEX, s.index)?;
            a.add_u64(DM_START, s.start)?;
            a.add_u64(DM_SIZE, s.size)?;
            a.add_u32(DM_TAG, s.tag)?;
            a.add_u32(DM_FLAG, s.flag)?;
            a.add_u64(DM_DEVT, ((di as u64) << 32) | s.index as u64)?;
            out.push(Descriptor {
                handle: Handle {
                    kind: DescriptorKind::Slice,
                    id: 2000 + di as u64 * 100 + s.index as u64,
                },
                name: format!("{}s{}", d.name, s.index),
                attrs: a,
            });
        }
        Ok(out)
    }
}

impl StorageProvider for FakeStorage {
    fn drives(&self) -> Result<Vec<Descriptor>> {
        Ok(self.drives.iter().enumerate().map(|(i, d)| Descriptor {
            handle: Handle { kind: DescriptorKind::Drive, id: i as u64 + 1 },
            name: d.name.clone(),
            attrs: d.attrs.clone(),
        }).collect())
    }

    fn partitions(&self, drive: &Descriptor) -> Result<Vec<Descriptor>> {
        let Some((di, d)) = self.find(&drive.name) else {
            bail!("no drive {}", drive.name);
        };

        let mut out = Vec::new();
        for p in d.partitions.iter() {
            let mut a = AttrList::new();
            a.add_u32(DM_BOOTID, p.bootid)?;
            a.add_u32(DM_PTYPE, p.id)?;
            a.add_u32(DM_RELSECT, p.relsect)?;
            a.add_u32(DM_NSECTORS, p.numsect)?;
            out.push(Descriptor {
                handle: Handle {
                    kind: DescriptorKind::Partition,
                    id: 1000 + di as u64 * 100 + p.number as u64,
                },
                name: format!("{}p{}", d.name, p.number),
                attrs: a,
            });
        }
        Ok(out)
    }

    fn slices(&self, parent: &Descriptor) -> Result<Vec<Descriptor>> {
        let disk = match parent.handle.kind {
            DescriptorKind::Drive => parent.name.as_str(),
            DescriptorKind::Partition => {
                let id = parent.attrs.lookup_u32(DM_PTYPE)?;
                if id != SUNIXOS && id != SUNIXOS2 {
                    return Ok(Vec::new());
                }
                names::disk_name(&parent.name)
            }
            k => bail!("no slices within a {:?}", k),
        };
        let Some((di, d)) = self.find(disk) else {
            bail!("no drive {}", disk);
        };
        self.slices_of(di, d)
    }

    fn controller(&self, drive: &Descriptor) -> Result<Option<Descriptor>> {
        let Some((di, d)) = self.find(&drive.name) else {
            return Ok(None);
        };
        let Some(c) = d.ctype.as_ref() else {
            return Ok(None);
        };
        let mut a = AttrList::new();
        a.add_string(DM_CTYPE, c)?;
        Ok(Some(Descriptor {
            handle: Handle { kind: DescriptorKind::Controller, id: 3000 + di as u64 },
            name: format!("c{}", di),
            attrs: a,
        }))
    }

    fn bus(&self, drive: &Descriptor) -> Result<Option<Descriptor>> {
        let Some((di, d)) = self.find(&drive.name) else {
            return Ok(None);
        };
        let Some(b) = d.btype.as_ref() else {
            return Ok(None);
        };
        let mut a = AttrList::new();
        a.add_string(DM_BTYPE, b)?;
        Ok(Some(Descriptor {
            handle: Handle { kind: DescriptorKind::Bus, id: 4000 + di as u64 },
            name: b.clone(),
            attrs: a,
        }))
    }

    fn alias(&self, drive: &Descriptor) -> Result<Option<String>> {
        Ok(Some(drive.name.clone()))
    }

    fn boot_disk(&self) -> Result<Option<String>> {
        Ok(self.boot.clone())
    }

    fn has_vtoc(&self, disk: &str) -> Result<bool> {
        Ok(self.find(disk).map(|(_, d)| d.vtoc).unwrap_or(false))
    }

    fn last_mount(&self, slice: &str) -> Option<String> {
        self.slice(slice).and_then(|s| s.last_mount.clone())
    }

    fn linux_swap(&self, partition: &str) -> bool {
        let Some(n) = names::partition_number(partition) else {
            return false;
        };
        self.find(names::disk_name(partition))
            .and_then(|(_, d)| d.partitions.iter().find(|p| p.number == n))
            .map(|p| p.swap)
            .unwrap_or(false)
    }
}
