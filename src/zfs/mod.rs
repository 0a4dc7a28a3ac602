/*
 * Copyright 2026 Oxide Computer Company
 */

//! ZFS pool enumeration: imported pools and pools available for import, each
//! with its tree of virtual devices.

pub mod host;

use crate::attrs::AttrList;
use crate::common::*;
use crate::keys::zpool as k;

/*
 * Pool status codes, derived from the "status:" line of zpool status.
 */
pub const STATUS_OK: u32 = 0;
pub const STATUS_MISSING_DEV: u32 = 1;
pub const STATUS_FAILING_DEV: u32 = 2;
pub const STATUS_OFFLINE_DEV: u32 = 3;
pub const STATUS_REMOVED_DEV: u32 = 4;
pub const STATUS_CORRUPT_DATA: u32 = 5;
pub const STATUS_RESILVERING: u32 = 6;
pub const STATUS_VERSION_OLDER: u32 = 7;
pub const STATUS_FEAT_DISABLED: u32 = 8;
pub const STATUS_UNKNOWN: u32 = 255;

/**
 * The version reported for pools using feature flags.
 */
pub const SPA_VERSION_FEATURES: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Vdev {
    pub name: String,
    pub health: String,
    pub read_errors: u64,
    pub write_errors: u64,
    pub checksum_errors: u64,
    pub children: Vec<Vdev>,
    pub is_log: bool,
    pub is_hole: bool,
    /**
     * For a hot spare: whether it is currently standing in for another device.
     */
    pub spared: bool,
}

impl Vdev {
    pub fn new(name: &str, health: &str) -> Vdev {
        Vdev {
            name: name.to_string(),
            health: health.to_string(),
            ..Default::default()
        }
    }

    pub fn to_attrs(&self) -> Result<AttrList> {
        let mut a = AttrList::new();
        a.add_string(k::NAME, &self.name)?;
        a.add_string(k::HEALTH, &self.health)?;
        a.add_u64(k::READ_ERRORS, self.read_errors)?;
        a.add_u64(k::WRITE_ERRORS, self.write_errors)?;
        a.add_u64(k::CHECKSUM_ERRORS, self.checksum_errors)?;
        add_list(&mut a, k::NUM_TARGETS, k::TARGETS, &self.children)?;
        Ok(a)
    }

    fn leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
        if self.children.is_empty() {
            out.push(&self.name);
        }
        for c in self.children.iter() {
            c.leaves(out);
        }
    }
}

fn add_list(a: &mut AttrList, num: &str, list: &str, vdevs: &[Vdev])
    -> Result<()>
{
    a.add_u32(num, vdevs.len() as u32)?;
    a.add_list_array(list, vdevs.iter()
        .map(Vdev::to_attrs)
        .collect::<Result<Vec<_>>>()?)?;
    Ok(())
}

/**
 * A pool as reported by a ZFS provider, before its device tree is sorted.
 */
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolRecord {
    pub name: String,
    pub guid: u64,
    pub health: String,
    pub status: u32,
    pub size: u64,
    pub capacity: u32,
    pub version: u64,
    pub bootfs: Option<String>,
    /**
     * Top-level devices, including logs and holes.
     */
    pub vdevs: Vec<Vdev>,
    pub l2cache: Vec<Vdev>,
    pub spares: Vec<Vdev>,
}

pub trait ZfsProvider: Send + Sync {
    fn imported(&self) -> Result<Vec<PoolRecord>>;

    /**
     * Pools found on /dev/dsk that could be imported, including destroyed
     * pools.
     */
    fn importable(&self) -> Result<Vec<PoolRecord>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZpoolInfo {
    pub name: String,
    pub guid: u64,
    pub health: String,
    pub status: u32,
    pub size: u64,
    pub capacity: u32,
    pub version: u64,
    pub bootfs: Option<String>,
    pub import: bool,
    pub targets: Vec<Vdev>,
    pub logs: Vec<Vdev>,
    pub l2cache: Vec<Vdev>,
    pub spares: Vec<Vdev>,
}

impl ZpoolInfo {
    fn from_record(r: PoolRecord, import: bool) -> ZpoolInfo {
        let mut targets = Vec::new();
        let mut logs = Vec::new();
        for v in r.vdevs {
            if v.is_hole {
                continue;
            }
            if v.is_log {
                logs.push(v);
            } else {
                targets.push(v);
            }
        }

        let spares = r.spares.into_iter().map(|v| Vdev {
            health: (if v.spared { k::SPARE_INUSE } else { k::SPARE_AVAIL })
                .to_string(),
            read_errors: 0,
            write_errors: 0,
            checksum_errors: 0,
            ..v
        }).collect();

        ZpoolInfo {
            name: r.name,
            guid: r.guid,
            health: r.health,
            status: r.status,
            size: r.size,
            capacity: r.capacity,
            version: r.version,
            bootfs: if import { None } else { r.bootfs },
            import,
            targets,
            logs,
            l2cache: r.l2cache,
            spares,
        }
    }

    pub fn to_attrs(&self) -> Result<AttrList> {
        let mut a = AttrList::new();
        a.add_string(k::NAME, &self.name)?;
        a.add_u64(k::GUID, self.guid)?;
        a.add_string(k::HEALTH, &self.health)?;
        a.add_u32(k::STATUS, self.status)?;
        a.add_u64(k::SIZE, self.size)?;
        a.add_u32(k::CAPACITY, self.capacity)?;
        a.add_u64(k::VERSION, self.version)?;
        if let Some(b) = self.bootfs.as_deref() {
            a.add_string(k::BOOTFS, b)?;
        }
        a.add_bool(k::IMPORT, self.import)?;
        add_list(&mut a, k::NUM_TARGETS, k::TARGETS, &self.targets)?;
        add_list(&mut a, k::NUM_LOGS, k::LOGS, &self.logs)?;
        add_list(&mut a, k::NUM_L2CACHE, k::L2CACHE, &self.l2cache)?;
        add_list(&mut a, k::NUM_SPARES, k::SPARES, &self.spares)?;
        Ok(a)
    }

    /**
     * Names of every leaf device in the pool.
     */
    pub fn leaf_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for v in self.targets.iter()
            .chain(self.logs.iter())
            .chain(self.l2cache.iter())
            .chain(self.spares.iter())
        {
            v.leaves(&mut out);
        }
        out
    }
}

/**
 * Collect imported pools, then importable pools that have not been destroyed.
 */
pub fn list_zpools(log: &Logger, zp: &dyn ZfsProvider) -> Result<Vec<ZpoolInfo>> {
    let mut out: Vec<ZpoolInfo> = zp.imported()?
        .into_iter()
        .map(|r| ZpoolInfo::from_record(r, false))
        .collect();

    for r in zp.importable()? {
        if r.health == "DESTROYED" {
            debug!(log, "skipping destroyed pool {}", r.name);
            continue;
        }
        out.push(ZpoolInfo::from_record(r, true));
    }

    Ok(out)
}

/**
 * Check a pool name against the ZFS naming rules.
 */
pub fn validate_pool_name(name: &str) -> Result<()> {
    let Some(first) = name.chars().next() else {
        bail!("pool name is empty");
    };
    if name.len() > 255 {
        bail!("pool name \"{}\" is too long", name);
    }
    if !first.is_ascii_alphabetic() {
        bail!("pool name \"{}\" must begin with a letter", name);
    }
    if let Some(c) = name.chars()
        .find(|c| !(c.is_ascii_alphanumeric() || "_-.:".contains(*c)))
    {
        bail!("pool name \"{}\" contains invalid character '{}'", name, c);
    }
    for r in ["mirror", "raidz", "draid", "spare"] {
        if name.starts_with(r) {
            bail!("pool name \"{}\" begins with reserved word \"{}\"", name, r);
        }
    }
    if name == "log" {
        bail!("pool name \"log\" is reserved");
    }
    let mut cs = name.chars();
    if cs.next() == Some('c') && cs.next().map(|c| c.is_ascii_digit()) == Some(true) {
        bail!("pool name \"{}\" looks like a disk name", name);
    }
    Ok(())
}
