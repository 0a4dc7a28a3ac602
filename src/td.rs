/*
 * Copyright 2026 Oxide Computer Company
 */

//! Target discovery.
//!
//! A Discovery takes a snapshot of the targets of one kind each time that
//! kind is discovered, and walks it with a cursor that is independent of the
//! cursors for other kinds.

use crate::attrs::{AttrList, Optional};
use crate::common::*;
use crate::keys;
use crate::keys::vtoc::{V_ROOT, V_USR};
use crate::storage::{self, MdProbe, StorageProvider};
use crate::translate;
use crate::zfs::{self, ZfsProvider};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Disk,
    Partition,
    Slice,
    Os,
    Zpool,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Disk => "disk",
            TargetKind::Partition => "partition",
            TargetKind::Slice => "slice",
            TargetKind::Os => "os",
            TargetKind::Zpool => "zpool",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "disk" => TargetKind::Disk,
            "partition" => TargetKind::Partition,
            "slice" => TargetKind::Slice,
            "os" => TargetKind::Os,
            "zpool" => TargetKind::Zpool,
            other => bail!("unknown target kind \"{}\"", other),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TdError {
    #[error("{0} targets have not been discovered")]
    NotDiscovered(TargetKind),

    #[error(transparent)]
    System(#[from] anyhow::Error),
}

struct Snapshot {
    targets: Vec<AttrList>,
    /**
     * Index of the current target; None before the first get_next().
     */
    cursor: Option<usize>,
}

pub struct Discovery {
    log: Logger,
    storage: Arc<dyn StorageProvider>,
    zfs: Arc<dyn ZfsProvider>,
    md: Option<Box<dyn MdProbe>>,
    snapshots: HashMap<TargetKind, Snapshot>,
}

impl Discovery {
    pub fn new(
        log: &Logger,
        storage: Arc<dyn StorageProvider>,
        zfs: Arc<dyn ZfsProvider>,
    ) -> Discovery {
        Discovery {
            log: component(log, "td"),
            storage,
            zfs,
            md: None,
            snapshots: HashMap::new(),
        }
    }

    /**
     * Fill in mirrored-root membership on discovered slices.
     */
    pub fn with_md_probe(mut self, md: Box<dyn MdProbe>) -> Discovery {
        self.md = Some(md);
        self
    }

    /**
     * Build a fresh list of targets of the given kind, replacing any earlier
     * list of that kind and resetting its cursor.  Returns the number of
     * targets found.
     */
    pub fn discover(&mut self, kind: TargetKind) -> Result<usize, TdError> {
        let targets = match kind {
            TargetKind::Disk => self.disks()?,
            TargetKind::Partition => self.partitions()?,
            TargetKind::Slice => self.slices()?,
            TargetKind::Os => self.instances()?,
            TargetKind::Zpool => self.zpools()?,
        };

        info!(self.log, "discovered {} {} targets", targets.len(), kind);
        let n = targets.len();
        self.snapshots.insert(kind, Snapshot { targets, cursor: None });
        Ok(n)
    }

    /**
     * Advance to the next target of the given kind.  Returns false, and
     * leaves the cursor past the end, once the list is exhausted.
     */
    pub fn get_next(&mut self, kind: TargetKind) -> Result<bool, TdError> {
        let snap = self.snapshots.get_mut(&kind)
            .ok_or(TdError::NotDiscovered(kind))?;

        let next = snap.cursor.map(|c| c + 1).unwrap_or(0);
        snap.cursor = Some(next.min(snap.targets.len()));
        Ok(next < snap.targets.len())
    }

    /**
     * A copy of the attributes of the current target of the given kind, or
     * None if the cursor is not on a target.
     */
    pub fn attributes(&self, kind: TargetKind)
        -> Result<Option<AttrList>, TdError>
    {
        let snap = self.snapshots.get(&kind)
            .ok_or(TdError::NotDiscovered(kind))?;

        Ok(snap.cursor.and_then(|c| snap.targets.get(c)).cloned())
    }

    pub fn targets(&self, kind: TargetKind) -> Result<&[AttrList], TdError> {
        self.snapshots.get(&kind)
            .map(|s| s.targets.as_slice())
            .ok_or(TdError::NotDiscovered(kind))
    }

    /**
     * Drop every snapshot.  Further queries fail until the next discover().
     */
    pub fn release(&mut self) {
        debug!(self.log, "releasing {} snapshots", self.snapshots.len());
        self.snapshots.clear();
    }

    fn disks(&self) -> Result<Vec<AttrList>> {
        let sp = &*self.storage;
        let drives = storage::list_drives(&self.log, sp)?;
        let boot = sp.boot_disk()?;

        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut have_boot = false;
        for d in drives.iter() {
            let mut a = match translate::synthesize_drive(&self.log, sp, d,
                boot.as_deref())
            {
                Ok(a) => a,
                Err(e) => {
                    warn!(self.log, "omitting drive {}: {:?}", d.name, e);
                    continue;
                }
            };

            let name = a.lookup_string(keys::disk::NAME)?.to_string();
            let bs = a.lookup_u32(keys::disk::BLOCKSIZE).optional()?
                .unwrap_or(0);
            if name.is_empty() || bs == 0 {
                warn!(self.log, "omitting drive {}: no usable block size",
                    d.name);
                continue;
            }
            if !seen.insert(name.clone()) {
                warn!(self.log, "omitting duplicate drive {}", name);
                continue;
            }

            if a.has(keys::disk::CURRBOOT) {
                if have_boot {
                    a.remove(keys::disk::CURRBOOT);
                }
                have_boot = true;
            }

            out.push(a);
        }
        Ok(out)
    }

    fn partitions(&self) -> Result<Vec<AttrList>> {
        let sp = &*self.storage;
        let drives = storage::list_drives(&self.log, sp)?;

        storage::list_partitions(sp, &drives, None)?
            .iter()
            .map(|p| translate::synthesize_partition(&self.log, sp, p))
            .collect()
    }

    fn slices(&self) -> Result<Vec<AttrList>> {
        let sp = &*self.storage;
        let drives = storage::list_drives(&self.log, sp)?;

        storage::list_slices(sp, &drives, None)?
            .iter()
            .map(|s| {
                translate::synthesize_slice(&self.log, sp, self.md.as_deref(),
                    s)
            })
            .collect()
    }

    /**
     * A slice holds an OS instance if its tag marks it as a root or /usr
     * slice and it carries a UFS file system that was last mounted at an
     * absolute path.
     */
    fn instances(&self) -> Result<Vec<AttrList>> {
        let mut out = Vec::new();
        for s in self.slices()? {
            let tag = s.lookup_u32(keys::slice::TAG).optional()?.unwrap_or(0);
            if tag != V_ROOT && tag != V_USR {
                continue;
            }
            let mnt = s.lookup_string(keys::slice::LASTMNT).optional()?
                .unwrap_or("");
            if !mnt.starts_with('/') {
                continue;
            }

            let name = s.lookup_string(keys::slice::NAME)?;
            debug!(self.log, "slice {} holds an instance (last mounted {})",
                name, mnt);
            let mut a = AttrList::new();
            a.add_string(keys::os::SLICE_NAME, name)?;
            out.push(a);
        }
        Ok(out)
    }

    fn zpools(&self) -> Result<Vec<AttrList>> {
        zfs::list_zpools(&self.log, &*self.zfs)?
            .iter()
            .map(|p| p.to_attrs())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fakes::storage::{FakeDrive, FakePartition, FakeSlice, FakeStorage};
    use crate::fakes::zfs::FakeZfs;
    use crate::keys::fdisk::SUNIXOS2;
    use crate::keys::vtoc::{V_BACKUP, V_SWAP};
    use crate::zfs::{PoolRecord, Vdev};

    fn discovery(sp: FakeStorage, zp: FakeZfs) -> Discovery {
        let log = crate::logging::sink_log(|_, _, _| {});
        Discovery::new(&log, Arc::new(sp), Arc::new(zp))
    }

    fn names(d: &Discovery, kind: TargetKind, key: &str) -> Vec<String> {
        d.targets(kind).unwrap().iter()
            .map(|a| a.lookup_string(key).unwrap().to_string())
            .collect()
    }

    #[test]
    fn kinds() -> Result<()> {
        for k in [TargetKind::Disk, TargetKind::Partition, TargetKind::Slice,
            TargetKind::Os, TargetKind::Zpool]
        {
            assert_eq!(k.to_string().parse::<TargetKind>()?, k);
        }
        assert!("media".parse::<TargetKind>().is_err());
        Ok(())
    }

    #[test]
    fn disks() -> Result<()> {
        let sp = FakeStorage::new()
            .drive(FakeDrive::new("c0t0d0"))
            .drive(FakeDrive::new("c0t1d0").blocksize(0))
            .drive(FakeDrive::new("c0t0d0"))
            .drive(FakeDrive::new("c1t0d0"))
            .boot_disk("c0t0d0");
        let mut d = discovery(sp, FakeZfs::new());

        assert_eq!(d.discover(TargetKind::Disk)?, 2);
        assert_eq!(names(&d, TargetKind::Disk, keys::disk::NAME),
            vec!["c0t0d0", "c1t0d0"]);

        let mut boot = 0;
        while d.get_next(TargetKind::Disk)? {
            let a = d.attributes(TargetKind::Disk)?.unwrap();
            println!("{:#?}", a);
            assert!(a.lookup_u32(keys::disk::BLOCKSIZE)? > 0);
            assert!(!a.lookup_string(keys::disk::NAME)?.is_empty());
            if a.lookup_bool(keys::disk::CURRBOOT).optional()?.unwrap_or(false) {
                boot += 1;
            }
        }
        assert_eq!(boot, 1);
        assert!(d.attributes(TargetKind::Disk)?.is_none());
        assert!(!d.get_next(TargetKind::Disk)?);
        Ok(())
    }

    #[test]
    fn empty_host() -> Result<()> {
        let sp = FakeStorage::new().drive(FakeDrive::new("c2t0d0")
            .mtype(crate::storage::dm::MediaType::Cdrom));
        let mut d = discovery(sp, FakeZfs::new());

        assert_eq!(d.discover(TargetKind::Disk)?, 0);
        assert!(d.targets(TargetKind::Disk)?.is_empty());
        assert!(!d.get_next(TargetKind::Disk)?);
        d.release();
        d.release();
        Ok(())
    }

    #[test]
    fn undiscovered() {
        let mut d = discovery(FakeStorage::new(), FakeZfs::new());
        assert!(matches!(d.get_next(TargetKind::Slice),
            Err(TdError::NotDiscovered(TargetKind::Slice))));
        assert!(matches!(d.attributes(TargetKind::Zpool),
            Err(TdError::NotDiscovered(TargetKind::Zpool))));
    }

    #[test]
    fn disk_without_vtoc_has_no_slices() -> Result<()> {
        let sp = FakeStorage::new().drive(FakeDrive::new("c0t0d0"));
        let mut d = discovery(sp, FakeZfs::new());
        assert_eq!(d.discover(TargetKind::Slice)?, 0);
        assert_eq!(d.discover(TargetKind::Os)?, 0);
        Ok(())
    }

    #[test]
    fn slices_partitions_and_instances() -> Result<()> {
        let sp = FakeStorage::new()
            .drive(FakeDrive::new("c0t0d0")
                .partition(FakePartition::new(1, SUNIXOS2, 16065, 83859300)
                    .active())
                .slice(FakeSlice::new(0, V_ROOT, 16065, 8000000)
                    .last_mount("/"))
                .slice(FakeSlice::new(1, V_SWAP, 8016065, 1000000))
                .slice(FakeSlice::new(2, V_BACKUP, 0, 83875365))
                .slice(FakeSlice::new(3, V_USR, 9016065, 1000000)
                    .last_mount("a")))
            .drive(FakeDrive::new("c1t0d0")
                .slice(FakeSlice::new(0, V_ROOT, 0, 1000)
                    .last_mount("/a")));
        let mut d = discovery(sp, FakeZfs::new());

        assert_eq!(d.discover(TargetKind::Partition)?, 1);
        assert_eq!(d.discover(TargetKind::Slice)?, 5);
        assert_eq!(d.discover(TargetKind::Os)?, 2);
        assert_eq!(names(&d, TargetKind::Os, keys::os::SLICE_NAME),
            vec!["c0t0d0s0", "c1t0d0s0"]);

        /*
         * Cursors for different kinds move independently.
         */
        assert!(d.get_next(TargetKind::Slice)?);
        assert!(d.get_next(TargetKind::Slice)?);
        assert!(d.get_next(TargetKind::Partition)?);
        let s = d.attributes(TargetKind::Slice)?.unwrap();
        assert_eq!(s.lookup_string(keys::slice::NAME)?, "c0t0d0s1");
        let p = d.attributes(TargetKind::Partition)?.unwrap();
        assert_eq!(p.lookup_string(keys::part::NAME)?, "c0t0d0p1");

        /*
         * Discovering again resets only that kind's cursor.
         */
        d.discover(TargetKind::Slice)?;
        assert!(d.attributes(TargetKind::Slice)?.is_none());
        assert!(d.attributes(TargetKind::Partition)?.is_some());

        d.release();
        assert!(d.targets(TargetKind::Slice).is_err());
        Ok(())
    }

    #[test]
    fn mirrored_pool() -> Result<()> {
        let mut mirror = Vdev::new("mirror-0", "ONLINE");
        mirror.children = vec![
            Vdev::new("c0t0d0s0", "ONLINE"),
            Vdev::new("c0t1d0s0", "ONLINE"),
        ];
        let zp = FakeZfs::new().with_imported(PoolRecord {
            name: "rpool".into(),
            health: "ONLINE".into(),
            vdevs: vec![
                mirror,
                Vdev { is_log: true, ..Vdev::new("c2t0d0", "ONLINE") },
            ],
            spares: vec![Vdev::new("c3t0d0", "ONLINE")],
            ..Default::default()
        });
        let mut d = discovery(FakeStorage::new(), zp);

        assert_eq!(d.discover(TargetKind::Zpool)?, 1);
        assert!(d.get_next(TargetKind::Zpool)?);
        let a = d.attributes(TargetKind::Zpool)?.unwrap();
        use crate::keys::zpool as z;
        assert_eq!(a.lookup_string(z::NAME)?, "rpool");
        assert_eq!(a.lookup_u32(z::NUM_TARGETS)?, 1);
        assert_eq!(a.lookup_u32(z::NUM_LOGS)?, 1);
        assert_eq!(a.lookup_u32(z::NUM_SPARES)?, 1);
        assert_eq!(a.lookup_list_array(z::TARGETS)?[0]
            .lookup_u32(z::NUM_TARGETS)?, 2);
        Ok(())
    }
}
