/*
 * Copyright 2026 Oxide Computer Company
 */

//! Creating ZFS volumes, optionally set up as swap or dump devices.

use super::{counted_names, inval, Backend, Env, TiError};
use crate::attrs::AttrList;
use crate::common::*;
use crate::exec::{stdout_string, Executor, DUMPADM, SWAP, ZFS};
use crate::keys::ti as k;
use crate::zfs;
use serde::Deserialize;
use std::fmt;
use std::process::Command;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum VolumeType {
    #[default]
    Generic = 0,
    Swap = 1,
    Dump = 2,
}

impl VolumeType {
    pub fn from_u32(v: u32) -> Option<VolumeType> {
        match v {
            0 => Some(VolumeType::Generic),
            1 => Some(VolumeType::Swap),
            2 => Some(VolumeType::Dump),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeType::Generic => "generic",
            VolumeType::Swap => "swap",
            VolumeType::Dump => "dump",
        }
    }
}

impl FromStr for VolumeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "generic" => VolumeType::Generic,
            "swap" => VolumeType::Swap,
            "dump" => VolumeType::Dump,
            other => bail!("unknown volume type \"{}\"", other),
        })
    }
}

/**
 * The block device through which a volume is used.
 */
pub fn zvol_device(dataset: &str) -> String {
    format!("/dev/zvol/dsk/{}", dataset)
}

/**
 * Whether "swap -l" lists the device as a swap area.
 */
pub fn swap_active(exec: &dyn Executor, device: &str) -> Result<bool> {
    let out = match exec.execute(Command::new(SWAP).arg("-l")) {
        Ok(out) => stdout_string(&out)?,
        /*
         * With no swap configured, "swap -l" complains and exits non-zero.
         */
        Err(e) if e.stderr()
            .map(|s| s.contains("No swap devices configured"))
            .unwrap_or(false) => String::new(),
        Err(e) => return Err(e.into()),
    };

    Ok(parse_swap_list(&out).iter().any(|d| d == device))
}

fn parse_swap_list(out: &str) -> Vec<String> {
    out.lines()
        .filter(|l| !l.starts_with("swapfile"))
        .filter_map(|l| l.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateVol(usize),
    RegisterSwap(usize),
    ConfigureDump(usize),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", match self {
            Step::CreateVol(_) => "create_vol",
            Step::RegisterSwap(_) => "register_swap",
            Step::ConfigureDump(_) => "configure_dump",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Volume {
    name: String,
    mb: u32,
    vtype: VolumeType,
}

pub struct Volumes {
    pool: String,
    volumes: Vec<Volume>,
}

impl Volumes {
    pub fn from_attrs(attrs: &AttrList) -> Result<Volumes, TiError> {
        let pool = attrs.lookup_string(k::POOL_NAME)?.to_string();
        zfs::validate_pool_name(&pool)
            .map_err(|e| TiError::InvalArg(e.to_string()))?;

        let names = counted_names(attrs)?;
        let sizes = attrs.lookup_u32_array(k::MB_SIZES)?;
        let types = attrs.lookup_u32_array(k::TYPES)?;
        if sizes.len() != names.len() || types.len() != names.len() {
            return inval("volume arrays differ in length".into());
        }

        let mut volumes = Vec::new();
        for (i, name) in names.into_iter().enumerate() {
            if sizes[i] == 0 {
                return inval(format!("volume {} has zero size", name));
            }
            let Some(vtype) = VolumeType::from_u32(types[i]) else {
                return inval(format!("volume {} has unknown type {}", name,
                    types[i]));
            };
            volumes.push(Volume { name, mb: sizes[i], vtype });
        }

        if volumes.iter().filter(|v| v.vtype == VolumeType::Dump).count() > 1 {
            return inval("only one dump volume may be given".into());
        }

        Ok(Volumes { pool, volumes })
    }

    fn dataset(&self, i: usize) -> String {
        format!("{}/{}", self.pool, self.volumes[i].name)
    }

    fn create(&self, env: &Env<'_, '_>, i: usize) -> Result<(), TiError> {
        let ds = self.dataset(i);
        env.run(Command::new(ZFS)
            .arg("create")
            .arg("-V")
            .arg(format!("{}m", self.volumes[i].mb))
            .arg(&ds))?;
        info!(env.log(), "created {} MB volume {}", self.volumes[i].mb, ds);
        Ok(())
    }

    fn register_swap(&self, env: &Env<'_, '_>, i: usize)
        -> Result<(), TiError>
    {
        env.run(Command::new(SWAP)
            .arg("-a")
            .arg(zvol_device(&self.dataset(i))))?;
        Ok(())
    }

    fn configure_dump(&self, env: &Env<'_, '_>, i: usize)
        -> Result<(), TiError>
    {
        env.run(Command::new(DUMPADM)
            .arg("-d")
            .arg(zvol_device(&self.dataset(i))))?;
        Ok(())
    }
}

impl Backend for Volumes {
    type Step = Step;

    fn plan(&self) -> Vec<Step> {
        let mut plan = Vec::new();
        for (i, v) in self.volumes.iter().enumerate() {
            plan.push(Step::CreateVol(i));
            match v.vtype {
                VolumeType::Generic => (),
                VolumeType::Swap => plan.push(Step::RegisterSwap(i)),
                VolumeType::Dump => plan.push(Step::ConfigureDump(i)),
            }
        }
        plan
    }

    fn run(&mut self, env: &mut Env<'_, '_>, step: Step) -> Result<(), TiError> {
        match step {
            Step::CreateVol(i) => self.create(env, i),
            Step::RegisterSwap(i) => self.register_swap(env, i),
            Step::ConfigureDump(i) => self.configure_dump(env, i),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fakes::exec::FakeExecutor;
    use crate::fakes::storage::FakeStorage;
    use crate::fakes::zfs::FakeZfs;
    use crate::ti::test::{context, create};
    use crate::ti::{TargetType, TiErrorCode};

    const SWAP_LIST: &str = "\
swapfile                 dev    swaplo   blocks     free
/dev/zvol/dsk/rpool/swap 85,1        8  4194296  4194296
";

    fn request(vols: &[(&str, u32, VolumeType)]) -> Result<AttrList> {
        let mut a = AttrList::new();
        a.add_u32(k::TARGET_TYPE, TargetType::ZfsVol as u32)?;
        a.add_string(k::POOL_NAME, "rpool")?;
        a.add_u32(k::NUM, vols.len() as u32)?;
        a.add_string_array(k::NAMES,
            &vols.iter().map(|v| v.0).collect::<Vec<_>>())?;
        a.add_u32_array(k::MB_SIZES,
            &vols.iter().map(|v| v.1).collect::<Vec<_>>())?;
        a.add_u32_array(k::TYPES,
            &vols.iter().map(|v| v.2 as u32).collect::<Vec<_>>())?;
        Ok(a)
    }

    #[test]
    fn swap_volume() -> Result<()> {
        let exec = FakeExecutor::new();
        exec.reply("/usr/sbin/swap -l", SWAP_LIST);
        let ctx = context(&exec, FakeStorage::new(), FakeZfs::new(), false);

        let a = request(&[("swap", 2048, VolumeType::Swap)])?;
        assert_eq!(ctx.plan(&a)?, vec!["create_vol", "register_swap"]);

        create(&ctx, &a).0?;
        assert_eq!(exec.calls(), vec![
            "/sbin/zfs create -V 2048m rpool/swap",
            "/usr/sbin/swap -a /dev/zvol/dsk/rpool/swap",
        ]);

        assert!(swap_active(&*exec, &zvol_device("rpool/swap"))?);
        assert!(!swap_active(&*exec, &zvol_device("rpool/dump"))?);
        Ok(())
    }

    #[test]
    fn no_swap_configured() -> Result<()> {
        let exec = FakeExecutor::new();
        exec.fail("/usr/sbin/swap -l", "No swap devices configured");
        assert!(!swap_active(&*exec, "/dev/zvol/dsk/rpool/swap")?);
        Ok(())
    }

    #[test]
    fn dump_and_generic() -> Result<()> {
        let exec = FakeExecutor::new();
        let ctx = context(&exec, FakeStorage::new(), FakeZfs::new(), true);

        let a = request(&[
            ("dump", 1024, VolumeType::Dump),
            ("data", 10, VolumeType::Generic),
        ])?;
        assert_eq!(ctx.plan(&a)?,
            vec!["create_vol", "configure_dump", "create_vol"]);
        create(&ctx, &a).0?;
        assert!(exec.calls().is_empty());
        Ok(())
    }

    #[test]
    fn bad_requests() -> Result<()> {
        let exec = FakeExecutor::new();
        let ctx = context(&exec, FakeStorage::new(), FakeZfs::new(), false);

        let zero = request(&[("swap", 0, VolumeType::Swap)])?;
        assert_eq!(create(&ctx, &zero).0.unwrap_err().code(),
            TiErrorCode::InvalArg);

        let mut odd = request(&[("swap", 10, VolumeType::Swap)])?;
        odd.set(k::TYPES, crate::attrs::AttrValue::U32Array(vec![7]));
        assert_eq!(create(&ctx, &odd).0.unwrap_err().code(),
            TiErrorCode::InvalArg);

        let two = request(&[
            ("d1", 10, VolumeType::Dump),
            ("d2", 10, VolumeType::Dump),
        ])?;
        assert!(Volumes::from_attrs(&two).is_err());

        assert!(exec.calls().is_empty());
        Ok(())
    }

    #[test]
    fn swap_list() {
        assert_eq!(parse_swap_list(SWAP_LIST), vec!["/dev/zvol/dsk/rpool/swap"]);
        assert!(parse_swap_list("").is_empty());
        assert_eq!("dump".parse::<VolumeType>().ok(), Some(VolumeType::Dump));
    }
}
