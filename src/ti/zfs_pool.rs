/*
 * Copyright 2026 Oxide Computer Company
 */

//! Creating a ZFS root pool.

use super::{inval, Backend, Env, TiError};
use crate::attrs::{AttrList, Optional};
use crate::common::*;
use crate::exec::ZPOOL;
use crate::keys::ti as k;
use crate::names;
use crate::zfs;
use std::fmt;
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreatePool,
    SetBootfs,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", match self {
            Step::CreatePool => "create_pool",
            Step::SetBootfs => "set_bootfs_property",
        })
    }
}

pub struct RootPool {
    name: String,
    device: String,
    bootfs: Option<String>,
}

impl RootPool {
    pub fn from_attrs(attrs: &AttrList) -> Result<RootPool, TiError> {
        let name = attrs.lookup_string(k::RPOOL_NAME)?.to_string();
        zfs::validate_pool_name(&name)
            .map_err(|e| TiError::InvalArg(e.to_string()))?;

        let device = attrs.lookup_string(k::DEVICE)?.to_string();
        if !names::is_slice_name(&device) {
            return inval(format!("\"{}\" is not a slice name", device));
        }

        let bootfs = attrs.lookup_string(k::BOOTFS).optional()?
            .map(str::to_string);
        if let Some(b) = bootfs.as_deref() {
            if !b.starts_with(&format!("{}/", name)) {
                return inval(format!("bootfs \"{}\" is not in pool {}", b,
                    name));
            }
        }

        Ok(RootPool { name, device: names::basename(&device).to_string(),
            bootfs })
    }

    /**
     * The device must be a slice the host knows of, and must not already
     * belong to an imported pool.
     */
    fn check_device(&self, env: &Env<'_, '_>) -> Result<(), TiError> {
        let disk = names::disk_name(&self.device);
        let d = env.drive(disk)?;
        if !env.slices(&d)?.iter().any(|s| s.name == self.device) {
            return Err(TiError::NoDevice(self.device.clone()));
        }

        let pools = zfs::list_zpools(env.log(), env.zfs())
            .map_err(TiError::system)?;
        for p in pools.iter().filter(|p| !p.import) {
            if p.leaf_names().iter().any(|l| names::basename(l) == self.device) {
                return Err(TiError::Busy(format!("{} is in use by pool {}",
                    self.device, p.name)));
            }
        }
        Ok(())
    }

    fn create(&self, env: &Env<'_, '_>) -> Result<(), TiError> {
        self.check_device(env)?;

        env.run(Command::new(ZPOOL)
            .arg("create")
            .arg("-f")
            .arg(&self.name)
            .arg(&self.device))?;
        info!(env.log(), "created pool {} on {}", self.name, self.device);
        Ok(())
    }

    fn set_bootfs(&self, env: &Env<'_, '_>) -> Result<(), TiError> {
        let Some(bootfs) = self.bootfs.as_deref() else {
            return Ok(());
        };

        env.run(Command::new(ZPOOL)
            .arg("set")
            .arg(format!("bootfs={}", bootfs))
            .arg(&self.name))?;
        Ok(())
    }
}

impl Backend for RootPool {
    type Step = Step;

    /**
     * Without a bootfs, the property is left for boot environment creation
     * to set.
     */
    fn plan(&self) -> Vec<Step> {
        let mut plan = vec![Step::CreatePool];
        if self.bootfs.is_some() {
            plan.push(Step::SetBootfs);
        }
        plan
    }

    fn run(&mut self, env: &mut Env<'_, '_>, step: Step) -> Result<(), TiError> {
        match step {
            Step::CreatePool => self.create(env),
            Step::SetBootfs => self.set_bootfs(env),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fakes::exec::FakeExecutor;
    use crate::fakes::storage::{FakeDrive, FakeSlice, FakeStorage};
    use crate::fakes::zfs::FakeZfs;
    use crate::keys::vtoc::{V_BACKUP, V_ROOT};
    use crate::ti::test::{context, create};
    use crate::ti::{TargetType, TiErrorCode};
    use crate::zfs::{PoolRecord, Vdev};

    fn request(name: &str, device: &str) -> Result<AttrList> {
        let mut a = AttrList::new();
        a.add_u32(k::TARGET_TYPE, TargetType::ZfsRpool as u32)?;
        a.add_string(k::RPOOL_NAME, name)?;
        a.add_string(k::DEVICE, device)?;
        Ok(a)
    }

    fn storage() -> FakeStorage {
        FakeStorage::new()
            .drive(FakeDrive::new("c0t0d0")
                .slice(FakeSlice::new(0, V_ROOT, 16065, 83859300))
                .slice(FakeSlice::new(2, V_BACKUP, 0, 83875365)))
            .drive(FakeDrive::new("c0t1d0")
                .slice(FakeSlice::new(0, V_ROOT, 16065, 83859300)))
    }

    #[test]
    fn plans() -> Result<()> {
        let a = request("rpool", "c0t0d0s0")?;
        let exec = FakeExecutor::new();
        let ctx = context(&exec, storage(), FakeZfs::new(), true);
        assert_eq!(ctx.plan(&a)?, vec!["create_pool"]);

        let mut a = a;
        a.add_string(k::BOOTFS, "rpool/ROOT/be")?;
        assert_eq!(ctx.plan(&a)?, vec!["create_pool", "set_bootfs_property"]);
        Ok(())
    }

    #[test]
    fn creates_pool() -> Result<()> {
        let exec = FakeExecutor::new();
        let ctx = context(&exec, storage(), FakeZfs::new(), false);

        let mut a = request("rpool", "/dev/dsk/c0t0d0s0")?;
        a.add_string(k::BOOTFS, "rpool/ROOT/be")?;
        create(&ctx, &a).0?;

        assert_eq!(exec.calls(), vec![
            "/sbin/zpool create -f rpool c0t0d0s0",
            "/sbin/zpool set bootfs=rpool/ROOT/be rpool",
        ]);
        Ok(())
    }

    #[test]
    fn bad_names() -> Result<()> {
        let exec = FakeExecutor::new();
        let ctx = context(&exec, storage(), FakeZfs::new(), false);

        for (name, device) in [
            ("mirror", "c0t0d0s0"),
            ("c0pool", "c0t0d0s0"),
            ("rpool", "c0t0d0p1"),
            ("rpool", "c0t0d0s16"),
        ] {
            let (res, _) = create(&ctx, &request(name, device)?);
            assert_eq!(res.unwrap_err().code(), TiErrorCode::InvalArg,
                "{} {}", name, device);
        }

        let mut a = request("rpool", "c0t0d0s0")?;
        a.add_string(k::BOOTFS, "tank/ROOT/be")?;
        assert_eq!(create(&ctx, &a).0.unwrap_err().code(),
            TiErrorCode::InvalArg);

        assert!(exec.calls().is_empty());
        Ok(())
    }

    #[test]
    fn device_checks() -> Result<()> {
        let exec = FakeExecutor::new();
        let zp = FakeZfs::new().with_imported(PoolRecord {
            name: "tank".into(),
            health: "ONLINE".into(),
            vdevs: vec![Vdev::new("c0t1d0s0", "ONLINE")],
            ..Default::default()
        });
        let ctx = context(&exec, storage(), zp, false);

        let (res, _) = create(&ctx, &request("rpool", "c0t0d0s5")?);
        assert_eq!(res.unwrap_err().code(), TiErrorCode::NoDevice);

        let (res, _) = create(&ctx, &request("rpool", "c0t1d0s0")?);
        assert_eq!(res.unwrap_err().code(), TiErrorCode::Busy);

        assert!(exec.calls().is_empty());
        Ok(())
    }

    #[test]
    fn existing_pool() -> Result<()> {
        let exec = FakeExecutor::new();
        exec.fail("/sbin/zpool create",
            "cannot create 'rpool': pool already exists");
        let ctx = context(&exec, storage(), FakeZfs::new(), false);

        let (res, _) = create(&ctx, &request("rpool", "c0t0d0s0")?);
        assert_eq!(res.unwrap_err().code(), TiErrorCode::AlreadyExists);
        Ok(())
    }
}
