/*
 * Copyright 2026 Oxide Computer Company
 */

//! Building a UFS ramdisk image, and tearing one down again.
//!
//! The boot archive file is the backing store: it is attached as a lofi
//! device, given a UFS file system and mounted at the destination so that it
//! can be populated.  Release unmounts it and detaches the lofi device, leaving
//! the archive file behind.

use super::{inval, Backend, Env, TiError};
use crate::attrs::{AttrList, Optional};
use crate::common::*;
use crate::exec::{stdin_from, stdout_string};
use crate::exec::{LOFIADM, MKFILE, MOUNT, NEWFS, UMOUNT};
use crate::file;
use crate::keys::ti as k;
use std::fmt;
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateFile,
    AttachLofi,
    Newfs,
    Mount,
    Unmount,
    DetachLofi,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", match self {
            Step::CreateFile => "create_file",
            Step::AttachLofi => "attach_lofi",
            Step::Newfs => "newfs",
            Step::Mount => "mount",
            Step::Unmount => "unmount",
            Step::DetachLofi => "detach_lofi",
        })
    }
}

pub struct Ramdisk {
    bootarch: String,
    dest: String,
    size_kb: u32,
    release: bool,
    lofi: Option<String>,
}

impl Ramdisk {
    pub fn from_attrs(attrs: &AttrList) -> Result<Ramdisk, TiError> {
        let bootarch = attrs.lookup_string(k::BOOTARCH_NAME)?.to_string();
        let dest = attrs.lookup_string(k::DEST)?.to_string();
        for p in [&bootarch, &dest] {
            if !p.starts_with('/') {
                return inval(format!("\"{}\" is not an absolute path", p));
            }
        }

        let release = attrs.lookup_bool(k::RELEASE).optional()?.unwrap_or(false);
        if release {
            return Ok(Ramdisk {
                bootarch,
                dest,
                size_kb: 0,
                release,
                lofi: None,
            });
        }

        let fs_type = attrs.lookup_string(k::FS_TYPE).optional()?
            .unwrap_or("ufs");
        if fs_type != "ufs" {
            return inval(format!("ramdisk file system type must be ufs, not \
                \"{}\"", fs_type));
        }

        let size_kb = attrs.lookup_u32(k::SIZE_KB)?;
        if size_kb == 0 {
            return inval("ramdisk size must be greater than zero".into());
        }

        Ok(Ramdisk { bootarch, dest, size_kb, release, lofi: None })
    }

    /**
     * The block device of the attached archive.  In dry-run mode nothing is
     * attached, so a placeholder stands in for it.
     */
    fn device(&self, env: &Env<'_, '_>) -> Result<String, TiError> {
        match (&self.lofi, env.dry_run()) {
            (Some(d), _) => Ok(d.clone()),
            (None, true) => Ok(format!("<lofi device of {}>", self.bootarch)),
            (None, false) => Err(TiError::SystemErr(format!(
                "{} is not attached to a lofi device", self.bootarch))),
        }
    }

    fn create_file(&self, env: &Env<'_, '_>) -> Result<(), TiError> {
        env.run(Command::new(MKFILE)
            .arg(format!("{}k", self.size_kb))
            .arg(&self.bootarch))?;
        Ok(())
    }

    fn attach(&mut self, env: &Env<'_, '_>) -> Result<(), TiError> {
        let Some(out) = env.run(Command::new(LOFIADM)
            .arg("-a")
            .arg(&self.bootarch))?
        else {
            return Ok(());
        };

        let dev = stdout_string(&out).map_err(TiError::system)?
            .trim()
            .to_string();
        if !dev.starts_with("/dev/lofi/") {
            return Err(TiError::SystemErr(format!(
                "lofiadm reported unexpected device \"{}\"", dev)));
        }

        info!(env.log(), "{} attached as {}", self.bootarch, dev);
        self.lofi = Some(dev);
        Ok(())
    }

    fn newfs(&self, env: &Env<'_, '_>) -> Result<(), TiError> {
        let rdev = self.device(env)?.replacen("/dev/lofi/", "/dev/rlofi/", 1);

        let mut cmd = Command::new(NEWFS);
        cmd.arg("-o").arg("space")
            .arg("-m").arg("0")
            .arg(&rdev);
        /*
         * newfs asks for confirmation before it writes.
         */
        stdin_from(&mut cmd, "y\n").map_err(TiError::system)?;
        env.run(&mut cmd)?;
        Ok(())
    }

    fn mount(&self, env: &Env<'_, '_>) -> Result<(), TiError> {
        if env.dry_run() {
            info!(env.log(), "dry run: mkdir -p {}", self.dest);
        } else {
            file::ensure_dir(env.log(), &self.dest).map_err(TiError::system)?;
        }

        env.run(Command::new(MOUNT)
            .arg("-F").arg("ufs")
            .arg("-o").arg("nologging,noatime")
            .arg(self.device(env)?)
            .arg(&self.dest))?;
        info!(env.log(), "ramdisk {} mounted at {}", self.bootarch, self.dest);
        Ok(())
    }

    fn unmount(&self, env: &Env<'_, '_>) -> Result<(), TiError> {
        env.run(Command::new(UMOUNT).arg(&self.dest))?;
        Ok(())
    }

    fn detach(&mut self, env: &Env<'_, '_>) -> Result<(), TiError> {
        env.run(Command::new(LOFIADM).arg("-d").arg(&self.bootarch))?;
        self.lofi = None;
        info!(env.log(), "released ramdisk {}", self.bootarch);
        Ok(())
    }
}

impl Backend for Ramdisk {
    type Step = Step;

    fn plan(&self) -> Vec<Step> {
        if self.release {
            vec![Step::Unmount, Step::DetachLofi]
        } else {
            vec![Step::CreateFile, Step::AttachLofi, Step::Newfs, Step::Mount]
        }
    }

    fn run(&mut self, env: &mut Env<'_, '_>, step: Step) -> Result<(), TiError> {
        match step {
            Step::CreateFile => self.create_file(env),
            Step::AttachLofi => self.attach(env),
            Step::Newfs => self.newfs(env),
            Step::Mount => self.mount(env),
            Step::Unmount => self.unmount(env),
            Step::DetachLofi => self.detach(env),
        }
    }
}
