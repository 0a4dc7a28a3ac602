/*
 * Copyright 2026 Oxide Computer Company
 */

//! The storage provider for the running system.

use super::dkio;
use super::dm::*;
use super::{Descriptor, DescriptorKind, Handle, StorageProvider};
use crate::attrs::{AttrList, Optional};
use crate::common::*;
use crate::exec::{self, BoxedExecutor};
use crate::keys::fdisk::{SUNIXOS, SUNIXOS2};
use crate::mnttab;
use crate::names;
use crate::probe::{mbr, swap, ufs, vtoc};
use std::collections::{BTreeSet, HashMap};
use std::os::unix::fs::MetadataExt;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

const RDSK: &str = "/dev/rdsk";
const DSK: &str = "/dev/dsk";

/*
 * Host-private keys carried on drive descriptors for the controller and bus
 * lookups.
 */
const CNAME: &str = "cname";
const PHYSPATH: &str = "physpath";

pub struct HostStorage {
    log: Logger,
    exec: BoxedExecutor,
    next: AtomicU64,
}

impl HostStorage {
    pub fn new(log: &Logger, exec: BoxedExecutor) -> HostStorage {
        HostStorage {
            log: component(log, "storage"),
            exec,
            next: AtomicU64::new(1),
        }
    }

    fn handle(&self, kind: DescriptorKind) -> Handle {
        Handle { kind, id: self.next.fetch_add(1, Ordering::Relaxed) }
    }

    fn query(&self, cmd: &mut Command) -> Result<String> {
        let out = self.exec.execute(cmd)?;
        exec::stdout_string(&out)
    }

    fn prtvtoc(&self, dev: &str) -> Result<vtoc::Vtoc> {
        let out = self.query(Command::new(exec::PRTVTOC).arg(dev))?;
        vtoc::parse(&out)
    }

    fn iostat(&self) -> HashMap<String, (String, String)> {
        match self.query(Command::new(exec::IOSTAT).arg("-En")) {
            Ok(out) => parse_iostat(&out),
            Err(e) => {
                warn!(self.log, "iostat: {:?}", e);
                HashMap::new()
            }
        }
    }

    fn drive(
        &self,
        disk: &str,
        path: &str,
        ids: &HashMap<String, (String, String)>,
    ) -> Result<Descriptor> {
        let f = dkio::open_raw(path).with_context(|| format!("open {}", path))?;
        let ci = dkio::info(&f)?;

        let mut a = AttrList::new();
        a.add_string(DM_OPATH, path)?;
        a.add_string(CNAME, &ci.cname)?;
        a.add_string(DM_CTYPE, ci.type_name())?;
        a.add_u32(DM_STATUS, DM_DRIVE_UP)?;
        a.add_bool(DM_REMOVABLE, dkio::removable(&f).unwrap_or(false))?;

        if let Some((vendor, product)) = ids.get(disk) {
            a.add_string(DM_VENDOR_ID, vendor)?;
            a.add_string(DM_PRODUCT_ID, product)?;
        }

        match dkio::media(&f) {
            Ok(mi) => {
                a.add_bool(DM_LOADED, true)?;
                a.add_u32(DM_MTYPE, mi.media_type as u32)?;
                a.add_u32(DM_BLOCKSIZE, mi.lbsize)?;
                a.add_u64(DM_SIZE, mi.capacity)?;
            }
            Err(e) => {
                debug!(self.log, "{}: no media: {}", disk, e);
                a.add_bool(DM_LOADED, false)?;
            }
        }

        if let Ok(g) = dkio::geometry(&f) {
            a.add_u32(DM_NHEADS, g.nhead as u32)?;
            a.add_u32(DM_NSECTORS, g.nsect as u32)?;
        }

        let (fdisk, efi) = if path.ends_with("p0") {
            let mut f = f;
            match mbr::read_table(&mut f)? {
                Some(t) => (!t.efi, t.efi),
                None => (false, false),
            }
        } else {
            (false, false)
        };
        a.add_bool(DM_FDISK, fdisk)?;
        a.add_bool(DM_EFI, efi)?;

        let dsk = format!("{}/{}", DSK, names::basename(path));
        if let Ok(target) = std::fs::read_link(&dsk) {
            a.add_string(PHYSPATH, &target.to_string_lossy())?;
        }

        Ok(Descriptor {
            handle: self.handle(DescriptorKind::Drive),
            name: path.to_string(),
            attrs: a,
        })
    }

    fn disk_of(&self, d: &Descriptor) -> Result<String> {
        Ok(names::disk_name(d.attrs.lookup_string(DM_OPATH)?).to_string())
    }

    /*
     * Slices of the VTOC on a disk.  A disk with no label, or with an EFI
     * label, has none.
     */
    fn vtoc_slices(&self, disk: &str) -> Result<Vec<Descriptor>> {
        let v = match self.prtvtoc(&format!("{}/{}s2", RDSK, disk)) {
            Ok(v) if !v.is_efi() => v,
            Ok(_) => return Ok(Vec::new()),
            Err(e) => {
                debug!(self.log, "{}: no VTOC: {:#}", disk, e);
                return Ok(Vec::new());
            }
        };

        let mut out = Vec::new();
        for s in v.slices.iter() {
            let name = format!("{}s{}", disk, s.index);
            let mut a = AttrList::new();
            a.add_u32(DM_INDEX, s.index)?;
            a.add_u64(DM_START, s.first)?;
            a.add_u64(DM_SIZE, s.count)?;
            a.add_u32(DM_TAG, s.tag)?;
            a.add_u32(DM_FLAG, s.flag)?;
            if let Ok(md) = std::fs::metadata(format!("{}/{}", DSK, name)) {
                a.add_u64(DM_DEVT, md.rdev())?;
            }
            out.push(Descriptor {
                handle: self.handle(DescriptorKind::Slice),
                name,
                attrs: a,
            });
        }
        Ok(out)
    }

    /*
     * Check that a candidate boot device is a disk we can open, and not a CD.
     */
    fn usable_boot_device(&self, disk: &str) -> bool {
        let path = format!("{}/{}p0", RDSK, disk);
        let path = if std::path::Path::new(&path).exists() {
            path
        } else {
            format!("{}/{}s2", RDSK, disk)
        };
        match dkio::open_raw(&path).map_err(anyhow::Error::from)
            .and_then(|f| dkio::info(&f))
        {
            Ok(ci) => ci.ctype != dkio::DKC_CDROM,
            Err(e) => {
                warn!(self.log, "boot device {}: {:#}", path, e);
                false
            }
        }
    }

    fn zpool_leaf(&self, pool: &str) -> Result<String> {
        let out = self.query(Command::new(exec::ZPOOL)
            .arg("list")
            .arg("-Hpv")
            .arg(pool))?;
        match zpool_leaf_device(pool, &out) {
            Some(d) => Ok(d),
            None => bail!("zpool list {} unexpected results: {:?}", pool, out),
        }
    }
}

impl StorageProvider for HostStorage {
    fn drives(&self) -> Result<Vec<Descriptor>> {
        let mut nodes = BTreeSet::new();
        for ent in std::fs::read_dir(RDSK).with_context(|| format!("read {}", RDSK))? {
            nodes.insert(ent?.file_name().to_string_lossy().to_string());
        }

        let ids = self.iostat();
        let mut out = Vec::new();
        for (disk, node) in whole_disks(&nodes) {
            let path = format!("{}/{}", RDSK, node);
            match self.drive(&disk, &path, &ids) {
                Ok(d) => out.push(d),
                Err(e) => warn!(self.log, "skipping drive {}: {:#}", disk, e),
            }
        }

        info!(self.log, "found {} drives", out.len());
        Ok(out)
    }

    fn partitions(&self, drive: &Descriptor) -> Result<Vec<Descriptor>> {
        if !drive.attrs.lookup_bool(DM_FDISK).optional()?.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let disk = self.disk_of(drive)?;
        let path = format!("{}/{}p0", RDSK, disk);
        let mut f = dkio::open_raw(&path).with_context(|| format!("open {}", path))?;
        let t = match mbr::read_table(&mut f)? {
            Some(t) => t,
            None => return Ok(Vec::new()),
        };

        let mut out = Vec::new();
        for p in t.partitions {
            let e = &p.entry;
            let mut a = AttrList::new();
            a.add_u32(DM_BOOTID, e.bootid)?;
            a.add_u32(DM_PTYPE, e.id)?;
            a.add_u32(DM_RELSECT, e.relsect)?;
            a.add_u32(DM_NSECTORS, e.numsect)?;
            a.add_u32(DM_BHEAD, e.bhead)?;
            a.add_u32(DM_BSECT, e.bsect)?;
            a.add_u32(DM_BCYL, e.bcyl)?;
            a.add_u32(DM_EHEAD, e.ehead)?;
            a.add_u32(DM_ESECT, e.esect)?;
            a.add_u32(DM_ECYL, e.ecyl)?;
            out.push(Descriptor {
                handle: self.handle(DescriptorKind::Partition),
                name: format!("{}p{}", disk, p.number),
                attrs: a,
            });
        }
        Ok(out)
    }

    fn slices(&self, parent: &Descriptor) -> Result<Vec<Descriptor>> {
        match parent.handle.kind {
            DescriptorKind::Drive => {
                let disk = self.disk_of(parent)?;
                self.vtoc_slices(&disk)
            }
            DescriptorKind::Partition => {
                let id = parent.attrs.lookup_u32(DM_PTYPE)?;
                if id == SUNIXOS || id == SUNIXOS2 {
                    self.vtoc_slices(names::disk_name(&parent.name))
                } else {
                    Ok(Vec::new())
                }
            }
            k => bail!("no slices within a {:?}", k),
        }
    }

    fn controller(&self, drive: &Descriptor) -> Result<Option<Descriptor>> {
        let ctype = match drive.attrs.lookup_string(DM_CTYPE).optional()? {
            Some(c) => c,
            None => return Ok(None),
        };
        let name = drive.attrs.lookup_string(CNAME).optional()?.unwrap_or("");

        let mut a = AttrList::new();
        a.add_string(DM_CTYPE, ctype)?;
        Ok(Some(Descriptor {
            handle: self.handle(DescriptorKind::Controller),
            name: name.to_string(),
            attrs: a,
        }))
    }

    fn bus(&self, drive: &Descriptor) -> Result<Option<Descriptor>> {
        let btype = match drive.attrs.lookup_string(PHYSPATH).optional()? {
            Some(p) => match bus_from_path(p) {
                Some(b) => b,
                None => return Ok(None),
            },
            None => return Ok(None),
        };

        let mut a = AttrList::new();
        a.add_string(DM_BTYPE, &btype)?;
        Ok(Some(Descriptor {
            handle: self.handle(DescriptorKind::Bus),
            name: btype,
            attrs: a,
        }))
    }

    fn alias(&self, drive: &Descriptor) -> Result<Option<String>> {
        Ok(drive.attrs.lookup_string(DM_OPATH).optional()?
            .map(|p| names::disk_name(p).to_string()))
    }

    fn boot_disk(&self) -> Result<Option<String>> {
        let mounts = mnttab::mounts()?;
        let root = match mnttab::find(&mounts, "/") {
            Some(m) => m,
            None => return Ok(None),
        };

        let dev = match root.fstype.as_str() {
            "zfs" => {
                let pool = root.special.split('/').next().unwrap_or("");
                let leaf = self.zpool_leaf(pool)?;
                if leaf.starts_with('/') {
                    leaf
                } else {
                    format!("{}/{}", DSK, leaf)
                }
            }
            "ufs" => root.special.clone(),
            other => {
                debug!(self.log, "root is {} on {}", other, root.special);
                return Ok(None);
            }
        };

        match names::boot_disk_from_path(&dev) {
            Some(disk) if self.usable_boot_device(disk) => {
                Ok(Some(disk.to_string()))
            }
            _ => Ok(None),
        }
    }

    fn has_vtoc(&self, disk: &str) -> Result<bool> {
        Ok(match self.prtvtoc(&format!("{}/{}s0", RDSK, disk)) {
            Ok(v) => !v.is_efi(),
            Err(_) => false,
        })
    }

    fn last_mount(&self, slice: &str) -> Option<String> {
        let path = format!("{}/{}", RDSK, names::basename(slice));
        let mut f = match dkio::open_raw(&path) {
            Ok(f) => f,
            Err(e) => {
                debug!(self.log, "open {}: {}", path, e);
                return None;
            }
        };
        ufs::last_mount(&mut f).unwrap_or_else(|e| {
            debug!(self.log, "read {}: {}", path, e);
            None
        })
    }

    fn linux_swap(&self, partition: &str) -> bool {
        let path = format!("{}/{}", RDSK, names::basename(partition));
        match dkio::open_raw(&path) {
            Ok(mut f) => swap::is_linux_swap(&mut f).unwrap_or(false),
            Err(_) => false,
        }
    }
}

/*
 * Pick the whole-disk node for each disk: "p0" where the platform has fdisk
 * partitions, otherwise the "s2" backup slice.
 */
fn whole_disks(nodes: &BTreeSet<String>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for n in nodes {
        if let Some(disk) = n.strip_suffix("p0") {
            out.push((disk.to_string(), n.clone()));
        } else if let Some(disk) = n.strip_suffix("s2") {
            if !nodes.contains(&format!("{}p0", disk)) {
                out.push((disk.to_string(), n.clone()));
            }
        }
    }
    out
}

/**
 * Extract the vendor and product of each device from "iostat -En" output.
 */
pub fn parse_iostat(out: &str) -> HashMap<String, (String, String)> {
    let mut res = HashMap::new();
    let mut cur: Option<String> = None;

    for l in out.lines() {
        if !l.starts_with(char::is_whitespace) && l.contains("Soft Errors:") {
            cur = l.split_whitespace().next().map(str::to_string);
            continue;
        }

        let (Some(dev), Some(v)) = (cur.as_ref(), l.find("Vendor:")) else {
            continue;
        };
        let rest = &l[v + "Vendor:".len()..];
        let (vendor, rest) = rest.split_once("Product:").unwrap_or((rest, ""));
        let product = rest.split("Revision:").next().unwrap_or("");
        res.insert(
            dev.clone(),
            (vendor.trim().to_string(), product.trim().to_string()),
        );
    }

    res
}

/**
 * The bus type is the first component under /devices of the physical path a
 * device link points at, less any unit address.
 */
pub fn bus_from_path(p: &str) -> Option<String> {
    let (_, rest) = p.split_once("/devices/")?;
    let comp = rest.split('/').next()?;
    let bus = comp.split('@').next()?;
    if bus.is_empty() {
        None
    } else {
        Some(bus.to_string())
    }
}

/**
 * Find the first leaf device listed under a pool by "zpool list -Hpv".
 */
pub fn zpool_leaf_device(pool: &str, out: &str) -> Option<String> {
    let mut lines = out.lines();
    let first: Vec<_> = lines.next()?.split('\t').collect();
    if first.first() != Some(&pool) {
        return None;
    }

    lines
        .filter_map(|l| l.split('\t').map(str::trim).find(|t| !t.is_empty()))
        .find(|t| {
            let p = if t.starts_with('/') {
                t.to_string()
            } else {
                format!("{}/{}", DSK, t)
            };
            names::boot_disk_from_path(&p).is_some()
        })
        .map(str::to_string)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn whole_disk_nodes() {
        let nodes: BTreeSet<String> = [
            "c0t0d0p0", "c0t0d0p1", "c0t0d0s0", "c0t0d0s2",
            "c1t0d0s0", "c1t0d0s2",
        ].iter().map(|s| s.to_string()).collect();

        assert_eq!(whole_disks(&nodes), vec![
            ("c0t0d0".to_string(), "c0t0d0p0".to_string()),
            ("c1t0d0".to_string(), "c1t0d0s2".to_string()),
        ]);
    }

    #[test]
    fn iostat_vendor_product() {
        let out = "\
c0t0d0           Soft Errors: 0 Hard Errors: 0 Transport Errors: 0
Vendor: ATA      Product: VBOX HARDDISK    Revision: 1.0  Serial No: VB2
Size: 42.95GB <42949672960 bytes>
Media Error: 0 Device Not Ready: 0 No Device: 0 Recoverable: 0
c1t0d0           Soft Errors: 0 Hard Errors: 0 Transport Errors: 0
Vendor: VBOX     Product: CD-ROM           Revision: 1.0  Serial No:
";
        let m = parse_iostat(out);
        println!("{:#?}", m);
        assert_eq!(m.get("c0t0d0"), Some(&("ATA".into(), "VBOX HARDDISK".into())));
        assert_eq!(m.get("c1t0d0"), Some(&("VBOX".into(), "CD-ROM".into())));
    }

    #[test]
    fn bus_names() {
        assert_eq!(
            bus_from_path("../../devices/pci@0,0/pci8086,2829@d/disk@0,0:q,raw"),
            Some("pci".to_string())
        );
        assert_eq!(
            bus_from_path("../../devices/scsi_vhci/disk@g5000c500a1b2c3d4:a"),
            Some("scsi_vhci".to_string())
        );
        assert_eq!(bus_from_path("c0t0d0p0"), None);
    }

    #[test]
    fn zpool_leaf() {
        let out = "rpool\t42949672960\t1\t2\t-\t-\t0\t0\t1.00\tONLINE\t-\n\
            \tc0t0d0s0\t42949672960\t1\t2\t-\t-\t0\t0\t-\tONLINE\n";
        assert_eq!(zpool_leaf_device("rpool", out), Some("c0t0d0s0".into()));

        let out = "rpool\t1\t1\n\tmirror-0\t1\t1\n\t\tc1t0d0s0\t1\n\t\tc1t1d0s0\t1\n";
        assert_eq!(zpool_leaf_device("rpool", out), Some("c1t0d0s0".into()));

        assert_eq!(zpool_leaf_device("tank", out), None);
    }
}
