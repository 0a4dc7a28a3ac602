/*
 * Copyright 2026 Oxide Computer Company
 */

//! Creating a boot environment.
//!
//! A boot environment "be" in pool "rpool" is rooted at rpool/ROOT/be, with
//! its own file systems beneath that.  Shared file systems live directly in
//! the pool and are used by every boot environment.

use super::{inval, opt_strings, Backend, Env, TiError};
use crate::attrs::AttrList;
use crate::common::*;
use crate::exec::{ZFS, ZPOOL};
use crate::keys::ti as k;
use crate::zfs;
use std::fmt;
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateRoot,
    CreateDatasets,
    CreateShared,
    SetBootfs,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", match self {
            Step::CreateRoot => "create_be_root",
            Step::CreateDatasets => "create_be_datasets",
            Step::CreateShared => "create_shared_datasets",
            Step::SetBootfs => "set_bootfs_property",
        })
    }
}

fn check_dataset(name: &str) -> Result<(), TiError> {
    if name.is_empty() || name.starts_with('/') || name.ends_with('/')
        || name.contains("//") || name.contains('@')
    {
        return inval(format!("invalid dataset name \"{}\"", name));
    }
    Ok(())
}

pub struct BootEnv {
    pool: String,
    name: String,
    datasets: Vec<String>,
    shared: Vec<String>,
}

impl BootEnv {
    pub fn from_attrs(attrs: &AttrList) -> Result<BootEnv, TiError> {
        let pool = attrs.lookup_string(k::RPOOL_NAME)?.to_string();
        zfs::validate_pool_name(&pool)
            .map_err(|e| TiError::InvalArg(e.to_string()))?;

        let name = attrs.lookup_string(k::BE_NAME)?.to_string();
        check_dataset(&name)?;
        if name.contains('/') {
            return inval(format!("boot environment name \"{}\" contains '/'",
                name));
        }

        let datasets = opt_strings(attrs, k::FS_NAMES)?;
        let shared = opt_strings(attrs, k::SHARED_FS_NAMES)?;
        for n in datasets.iter().chain(shared.iter()) {
            check_dataset(n)?;
        }

        Ok(BootEnv { pool, name, datasets, shared })
    }

    fn root(&self) -> String {
        format!("{}/ROOT/{}", self.pool, self.name)
    }

    /**
     * Create a dataset, treating one that already exists as created if
     * "existing_ok" is set.
     */
    fn zfs_create(
        &self,
        env: &Env<'_, '_>,
        opts: &[&str],
        dataset: &str,
        existing_ok: bool,
    ) -> Result<(), TiError> {
        let mut cmd = Command::new(ZFS);
        cmd.arg("create");
        for o in opts {
            cmd.arg("-o").arg(o);
        }
        cmd.arg(dataset);

        match env.run(&mut cmd) {
            Ok(_) => Ok(()),
            Err(TiError::AlreadyExists(_)) if existing_ok => {
                debug!(env.log(), "{} already exists", dataset);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn create_root(&self, env: &Env<'_, '_>) -> Result<(), TiError> {
        let container = format!("{}/ROOT", self.pool);
        self.zfs_create(env, &["canmount=off", "mountpoint=legacy"],
            &container, true)?;
        self.zfs_create(env, &["canmount=noauto", "mountpoint=/"],
            &self.root(), false)?;
        info!(env.log(), "created boot environment {}", self.root());
        Ok(())
    }

    fn create_datasets(&self, env: &mut Env<'_, '_>) -> Result<(), TiError> {
        let n = self.datasets.len();
        for (i, ds) in self.datasets.iter().enumerate() {
            let full = format!("{}/{}", self.root(), ds);
            self.zfs_create(env, &["canmount=noauto"], &full, false)?;
            env.update(((i + 1) * 100 / n) as u32);
        }
        Ok(())
    }

    fn create_shared(&self, env: &mut Env<'_, '_>) -> Result<(), TiError> {
        let n = self.shared.len();
        for (i, ds) in self.shared.iter().enumerate() {
            let full = format!("{}/{}", self.pool, ds);
            let mp = format!("mountpoint=/{}", ds);
            self.zfs_create(env, &[mp.as_str()], &full, true)?;
            env.update(((i + 1) * 100 / n) as u32);
        }
        Ok(())
    }

    fn set_bootfs(&self, env: &Env<'_, '_>) -> Result<(), TiError> {
        env.run(Command::new(ZPOOL)
            .arg("set")
            .arg(format!("bootfs={}", self.root()))
            .arg(&self.pool))?;
        Ok(())
    }
}

impl Backend for BootEnv {
    type Step = Step;

    fn plan(&self) -> Vec<Step> {
        let mut plan = vec![Step::CreateRoot];
        if !self.datasets.is_empty() {
            plan.push(Step::CreateDatasets);
        }
        if !self.shared.is_empty() {
            plan.push(Step::CreateShared);
        }
        plan.push(Step::SetBootfs);
        plan
    }

    fn run(&mut self, env: &mut Env<'_, '_>, step: Step) -> Result<(), TiError> {
        match step {
            Step::CreateRoot => self.create_root(env),
            Step::CreateDatasets => self.create_datasets(env),
            Step::CreateShared => self.create_shared(env),
            Step::SetBootfs => self.set_bootfs(env),
        }
    }
}
