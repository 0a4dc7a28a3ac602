/*
 * Copyright 2026 Oxide Computer Company
 */

//! Creating ZFS file systems.  Requests may be repeated: a dataset that
//! already exists is left as it is.

use super::{counted_names, inval, opt_strings, Backend, Env, TiError};
use crate::attrs::AttrList;
use crate::common::*;
use crate::exec::ZFS;
use crate::keys::ti as k;
use crate::zfs;
use std::fmt;
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateFilesystems,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "create_filesystems")
    }
}

pub struct Filesystems {
    pool: String,
    names: Vec<String>,
    properties: Vec<String>,
}

impl Filesystems {
    pub fn from_attrs(attrs: &AttrList) -> Result<Filesystems, TiError> {
        let pool = attrs.lookup_string(k::POOL_NAME)?.to_string();
        zfs::validate_pool_name(&pool)
            .map_err(|e| TiError::InvalArg(e.to_string()))?;

        let names = counted_names(attrs)?;

        let properties = opt_strings(attrs, k::PROPERTIES)?;
        for p in properties.iter() {
            match p.split_once('=') {
                Some((key, _)) if !key.is_empty() => (),
                _ => return inval(format!("property \"{}\" is not of the \
                    form key=value", p)),
            }
        }

        Ok(Filesystems { pool, names, properties })
    }

    fn create(&self, env: &mut Env<'_, '_>) -> Result<(), TiError> {
        let n = self.names.len();
        for (i, name) in self.names.iter().enumerate() {
            let dataset = format!("{}/{}", self.pool, name);

            let mut cmd = Command::new(ZFS);
            cmd.arg("create").arg("-p");
            for p in self.properties.iter() {
                cmd.arg("-o").arg(p);
            }
            cmd.arg(&dataset);

            match env.run(&mut cmd) {
                Ok(_) => info!(env.log(), "created {}", dataset),
                Err(TiError::AlreadyExists(_)) => {
                    info!(env.log(), "{} already exists", dataset);
                }
                Err(e) => return Err(e),
            }

            env.update(((i + 1) * 100 / n) as u32);
        }
        Ok(())
    }
}

impl Backend for Filesystems {
    type Step = Step;

    fn plan(&self) -> Vec<Step> {
        vec![Step::CreateFilesystems]
    }

    fn run(&mut self, env: &mut Env<'_, '_>, step: Step) -> Result<(), TiError> {
        match step {
            Step::CreateFilesystems => self.create(env),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fakes::exec::FakeExecutor;
    use crate::fakes::storage::FakeStorage;
    use crate::fakes::zfs::FakeZfs;
    use crate::progress::{Milestone, ProgressEvent};
    use crate::ti::test::{context, create};
    use crate::ti::{TargetType, TiErrorCode};

    fn request(pool: &str, names: &[&str]) -> Result<AttrList> {
        let mut a = AttrList::new();
        a.add_u32(k::TARGET_TYPE, TargetType::ZfsFs as u32)?;
        a.add_string(k::POOL_NAME, pool)?;
        a.add_u32(k::NUM, names.len() as u32)?;
        a.add_string_array(k::NAMES, names)?;
        Ok(a)
    }

    #[test]
    fn creates_and_tolerates_existing() -> Result<()> {
        let exec = FakeExecutor::new();
        exec.fail("/sbin/zfs create -p -o compression=on rpool/export",
            "cannot create 'rpool/export': dataset already exists");
        let ctx = context(&exec, FakeStorage::new(), FakeZfs::new(), false);

        let mut a = request("rpool", &["export", "export/home"])?;
        a.add_string_array(k::PROPERTIES, &["compression=on"])?;

        let (res, events) = create(&ctx, &a);
        res?;
        assert_eq!(exec.calls(), vec![
            "/sbin/zfs create -p -o compression=on rpool/export",
            "/sbin/zfs create -p -o compression=on rpool/export/home",
        ]);
        assert!(events.contains(&ProgressEvent::Milestone(Milestone {
            ms_num: 1, ms_curr: 1, ms_perc_done: 50, ms_perc: 50,
        })));
        Ok(())
    }

    #[test]
    fn other_failures_stop() -> Result<()> {
        let exec = FakeExecutor::new();
        exec.fail("/sbin/zfs create -p rpool/a",
            "cannot create 'rpool/a': permission denied");
        let ctx = context(&exec, FakeStorage::new(), FakeZfs::new(), false);

        let (res, events) = create(&ctx, &request("rpool", &["a", "b"])?);
        assert_eq!(res.unwrap_err().code(), TiErrorCode::NoPermission);
        assert_eq!(events.last(),
            Some(&ProgressEvent::Error(TiErrorCode::NoPermission)));
        assert_eq!(exec.calls().len(), 1);
        Ok(())
    }

    #[test]
    fn bad_requests() -> Result<()> {
        let mut a = request("rpool", &["a", "b"])?;
        a.set(k::NUM, crate::attrs::AttrValue::U32(3));
        assert!(Filesystems::from_attrs(&a).is_err());

        let mut a = request("rpool", &["a"])?;
        a.add_string_array(k::PROPERTIES, &["=on"])?;
        assert!(Filesystems::from_attrs(&a).is_err());

        assert!(Filesystems::from_attrs(&request("1pool", &["a"])?).is_err());
        assert!(Filesystems::from_attrs(&request("rpool", &["/a"])?).is_err());
        Ok(())
    }
}
