/*
 * Copyright 2026 Oxide Computer Company
 */

//! Instantiation requests read from TOML or YAML files.
//!
//! Each file describes one target.  The "target_type" key selects the kind
//! of target and the remaining keys are those of the attribute list that
//! instantiation expects, with the parallel arrays of the fdisk, VTOC and
//! volume requests written as lists of tables instead.

use crate::attrs::AttrList;
use crate::common::*;
use crate::file::{read_toml, read_yaml};
use crate::keys::fdisk::ACTIVE;
use crate::keys::ti as k;
use crate::ti::zfs_vol::VolumeType;
use crate::ti::TargetType;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "target_type", rename_all = "snake_case")]
pub enum Request {
    Fdisk(FdiskRequest),
    Vtoc(VtocRequest),
    ZfsRpool(RootPoolRequest),
    ZfsFs(FilesystemsRequest),
    ZfsVol(VolumesRequest),
    Be(BootEnvRequest),
    DcRamdisk(RamdiskRequest),
    DcUfs(DirRequest),
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct FdiskRequest {
    pub disk_name: String,
    #[serde(default)]
    pub whole_disk: bool,
    #[serde(default)]
    pub partitions: Vec<FdiskPartition>,
}

#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct FdiskPartition {
    pub id: u32,
    pub active: bool,
    pub bhead: u32,
    pub bsect: u32,
    pub bcyl: u32,
    pub ehead: u32,
    pub esect: u32,
    pub ecyl: u32,
    pub rsect: u32,
    pub numsect: u32,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct VtocRequest {
    pub disk_name: String,
    #[serde(default)]
    pub default_layout: bool,
    #[serde(default)]
    pub slices: Vec<VtocSlice>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct VtocSlice {
    pub index: u32,
    pub tag: u32,
    #[serde(default)]
    pub flag: u32,
    pub first: u64,
    pub size: u64,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct RootPoolRequest {
    pub rpool_name: String,
    pub device: String,
    pub bootfs: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct FilesystemsRequest {
    pub pool_name: String,
    pub names: Vec<String>,
    #[serde(default)]
    pub properties: Vec<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct VolumesRequest {
    pub pool_name: String,
    pub volumes: Vec<VolumeRequest>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct VolumeRequest {
    pub name: String,
    pub size_mb: u32,
    #[serde(rename = "type", default)]
    pub vtype: VolumeType,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct BootEnvRequest {
    pub rpool_name: String,
    pub be_name: String,
    #[serde(default)]
    pub fs_names: Vec<String>,
    #[serde(default)]
    pub shared_fs_names: Vec<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct RamdiskRequest {
    pub bootarch_name: String,
    pub dest: String,
    pub fs_type: Option<String>,
    pub size_kb: Option<u32>,
    #[serde(default)]
    pub release: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct DirRequest {
    pub dest: String,
}

impl Request {
    /**
     * Read a request file; files named *.yaml or *.yml are YAML, anything
     * else TOML.
     */
    pub fn load(path: &str) -> Result<Request> {
        let r = if path.ends_with(".yaml") || path.ends_with(".yml") {
            read_yaml(path)?
        } else {
            read_toml(path)?
        };
        r.ok_or_else(|| anyhow!("request file {} not found", path))
    }

    pub fn target_type(&self) -> TargetType {
        match self {
            Request::Fdisk(_) => TargetType::Fdisk,
            Request::Vtoc(_) => TargetType::Vtoc,
            Request::ZfsRpool(_) => TargetType::ZfsRpool,
            Request::ZfsFs(_) => TargetType::ZfsFs,
            Request::ZfsVol(_) => TargetType::ZfsVol,
            Request::Be(_) => TargetType::Be,
            Request::DcRamdisk(_) => TargetType::DcRamdisk,
            Request::DcUfs(_) => TargetType::DcUfs,
        }
    }

    pub fn to_attrs(&self) -> Result<AttrList> {
        let mut a = AttrList::new();
        a.add_u32(k::TARGET_TYPE, self.target_type() as u32)?;

        match self {
            Request::Fdisk(r) => {
                a.add_string(k::DISK_NAME, &r.disk_name)?;
                a.add_bool(k::WHOLE_DISK, r.whole_disk)?;
                if !r.whole_disk {
                    let p = &r.partitions;
                    let col = |f: fn(&FdiskPartition) -> u32| {
                        p.iter().map(f).collect::<Vec<_>>()
                    };
                    a.add_u32_array(k::IDS, &col(|p| p.id))?;
                    a.add_u32_array(k::ACTIVE,
                        &col(|p| if p.active { ACTIVE } else { 0 }))?;
                    a.add_u32_array(k::BHEADS, &col(|p| p.bhead))?;
                    a.add_u32_array(k::BSECTS, &col(|p| p.bsect))?;
                    a.add_u32_array(k::BCYLS, &col(|p| p.bcyl))?;
                    a.add_u32_array(k::EHEADS, &col(|p| p.ehead))?;
                    a.add_u32_array(k::ESECTS, &col(|p| p.esect))?;
                    a.add_u32_array(k::ECYLS, &col(|p| p.ecyl))?;
                    a.add_u32_array(k::RSECTS, &col(|p| p.rsect))?;
                    a.add_u32_array(k::NUMSECTS, &col(|p| p.numsect))?;
                }
            }
            Request::Vtoc(r) => {
                a.add_string(k::DISK_NAME, &r.disk_name)?;
                a.add_bool(k::DEFAULT_LAYOUT, r.default_layout)?;
                if !r.default_layout {
                    let s = &r.slices;
                    a.add_u32_array(k::PARTS,
                        &s.iter().map(|s| s.index).collect::<Vec<_>>())?;
                    a.add_u32_array(k::TAGS,
                        &s.iter().map(|s| s.tag).collect::<Vec<_>>())?;
                    a.add_u32_array(k::FLAGS,
                        &s.iter().map(|s| s.flag).collect::<Vec<_>>())?;
                    a.add_u64_array(k::FIRST_SECTORS,
                        &s.iter().map(|s| s.first).collect::<Vec<_>>())?;
                    a.add_u64_array(k::SIZES,
                        &s.iter().map(|s| s.size).collect::<Vec<_>>())?;
                }
            }
            Request::ZfsRpool(r) => {
                a.add_string(k::RPOOL_NAME, &r.rpool_name)?;
                a.add_string(k::DEVICE, &r.device)?;
                if let Some(b) = r.bootfs.as_deref() {
                    a.add_string(k::BOOTFS, b)?;
                }
            }
            Request::ZfsFs(r) => {
                a.add_string(k::POOL_NAME, &r.pool_name)?;
                a.add_u32(k::NUM, r.names.len() as u32)?;
                a.add_string_array(k::NAMES, &r.names)?;
                if !r.properties.is_empty() {
                    a.add_string_array(k::PROPERTIES, &r.properties)?;
                }
            }
            Request::ZfsVol(r) => {
                let v = &r.volumes;
                a.add_string(k::POOL_NAME, &r.pool_name)?;
                a.add_u32(k::NUM, v.len() as u32)?;
                a.add_string_array(k::NAMES,
                    &v.iter().map(|v| v.name.as_str()).collect::<Vec<_>>())?;
                a.add_u32_array(k::MB_SIZES,
                    &v.iter().map(|v| v.size_mb).collect::<Vec<_>>())?;
                a.add_u32_array(k::TYPES,
                    &v.iter().map(|v| v.vtype as u32).collect::<Vec<_>>())?;
            }
            Request::Be(r) => {
                a.add_string(k::RPOOL_NAME, &r.rpool_name)?;
                a.add_string(k::BE_NAME, &r.be_name)?;
                a.add_string_array(k::FS_NAMES, &r.fs_names)?;
                a.add_string_array(k::SHARED_FS_NAMES, &r.shared_fs_names)?;
            }
            Request::DcRamdisk(r) => {
                a.add_string(k::BOOTARCH_NAME, &r.bootarch_name)?;
                a.add_string(k::DEST, &r.dest)?;
                if let Some(t) = r.fs_type.as_deref() {
                    a.add_string(k::FS_TYPE, t)?;
                }
                if let Some(s) = r.size_kb {
                    a.add_u32(k::SIZE_KB, s)?;
                }
                a.add_bool(k::RELEASE, r.release)?;
            }
            Request::DcUfs(r) => {
                a.add_string(k::DEST, &r.dest)?;
            }
        }

        Ok(a)
    }
}
