/*
 * Copyright 2026 Oxide Computer Company
 */

//! Target instantiation.
//!
//! A request is an attribute list whose "target_type" selects a back-end.  The
//! back-end checks the request, plans a list of milestones and then runs them
//! in order, stopping at the first failure.  Every command that changes the
//! host goes through Env::run(), which only logs the command in dry-run mode.

use crate::attrs::{AttrError, AttrList, Optional};
use crate::common::*;
use crate::dryrun;
use crate::exec::{command_to_string, ExecutionError, Executor, BoxedExecutor};
use crate::keys;
use crate::progress::{Progress, ProgressFn};
use crate::storage::{self, Descriptor, StorageProvider};
use crate::zfs::ZfsProvider;
use std::fmt;
use std::process::{Command, Output};
use std::str::FromStr;
use std::sync::Arc;

pub mod be;
pub mod dir;
pub mod fdisk;
pub mod ramdisk;
pub mod vtoc;
pub mod zfs_fs;
pub mod zfs_pool;
pub mod zfs_vol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TargetType {
    Fdisk = 0,
    Vtoc = 1,
    ZfsRpool = 2,
    ZfsFs = 3,
    ZfsVol = 4,
    Be = 5,
    DcRamdisk = 6,
    DcUfs = 7,
}

impl TargetType {
    pub const ALL: [TargetType; 8] = [
        TargetType::Fdisk,
        TargetType::Vtoc,
        TargetType::ZfsRpool,
        TargetType::ZfsFs,
        TargetType::ZfsVol,
        TargetType::Be,
        TargetType::DcRamdisk,
        TargetType::DcUfs,
    ];

    pub fn from_u32(v: u32) -> Option<TargetType> {
        TargetType::ALL.iter().copied().find(|t| *t as u32 == v)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Fdisk => "fdisk",
            TargetType::Vtoc => "vtoc",
            TargetType::ZfsRpool => "zfs_rpool",
            TargetType::ZfsFs => "zfs_fs",
            TargetType::ZfsVol => "zfs_vol",
            TargetType::Be => "be",
            TargetType::DcRamdisk => "dc_ramdisk",
            TargetType::DcUfs => "dc_ufs",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        TargetType::ALL.iter().copied().find(|t| t.as_str() == s)
            .ok_or_else(|| anyhow!("unknown target type \"{}\"", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TiErrorCode {
    Success = 0,
    InvalArg,
    NoMem,
    NoDevice,
    Busy,
    AlreadyExists,
    NotFound,
    NoPermission,
    SystemErr,
    Cancelled,
    DryrunOnly,
}

#[derive(Debug, thiserror::Error)]
pub enum TiError {
    #[error("invalid request: {0}")]
    InvalArg(String),

    #[error("out of memory")]
    NoMem,

    #[error("no such device: {0}")]
    NoDevice(String),

    #[error("device busy: {0}")]
    Busy(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    NoPermission(String),

    #[error("system error: {0}")]
    SystemErr(String),

    #[error("cancelled")]
    Cancelled,

    #[error("not possible in dry-run mode: {0}")]
    DryrunOnly(String),
}

impl TiError {
    pub fn code(&self) -> TiErrorCode {
        match self {
            TiError::InvalArg(_) => TiErrorCode::InvalArg,
            TiError::NoMem => TiErrorCode::NoMem,
            TiError::NoDevice(_) => TiErrorCode::NoDevice,
            TiError::Busy(_) => TiErrorCode::Busy,
            TiError::AlreadyExists(_) => TiErrorCode::AlreadyExists,
            TiError::NotFound(_) => TiErrorCode::NotFound,
            TiError::NoPermission(_) => TiErrorCode::NoPermission,
            TiError::SystemErr(_) => TiErrorCode::SystemErr,
            TiError::Cancelled => TiErrorCode::Cancelled,
            TiError::DryrunOnly(_) => TiErrorCode::DryrunOnly,
        }
    }

    /**
     * Classify a failed command by its diagnostic output.  The output is
     * logged as-is.
     */
    pub fn from_exec(log: &Logger, e: &ExecutionError) -> TiError {
        error!(log, "{}", e);

        let Some(stderr) = e.stderr() else {
            return TiError::SystemErr(e.to_string());
        };
        let msg = stderr.to_string();
        let lc = stderr.to_ascii_lowercase();

        if lc.contains("permission denied") || lc.contains("not owner") {
            TiError::NoPermission(msg)
        } else if lc.contains("already exists") {
            TiError::AlreadyExists(msg)
        } else if lc.contains("busy") || lc.contains("in use") {
            TiError::Busy(msg)
        } else if lc.contains("no such device") {
            TiError::NoDevice(msg)
        } else if lc.contains("no such") || lc.contains("does not exist")
            || lc.contains("not found")
        {
            TiError::NotFound(msg)
        } else if lc.contains("out of memory") {
            TiError::NoMem
        } else {
            TiError::SystemErr(if msg.is_empty() { e.to_string() } else { msg })
        }
    }

    /**
     * Wrap an internal failure.
     */
    pub fn system(e: anyhow::Error) -> TiError {
        TiError::SystemErr(format!("{:?}", e))
    }
}

impl From<AttrError> for TiError {
    fn from(e: AttrError) -> TiError {
        TiError::InvalArg(e.to_string())
    }
}

/**
 * Shorthand for a request check.
 */
pub(crate) fn inval<T>(msg: String) -> Result<T, TiError> {
    Err(TiError::InvalArg(msg))
}

/**
 * An array attribute that may be left out, taken as empty.
 */
pub(crate) fn opt_strings(attrs: &AttrList, name: &str)
    -> Result<Vec<String>, TiError>
{
    Ok(attrs.lookup_string_array(name).optional()?
        .map(|a| a.to_vec())
        .unwrap_or_default())
}

/**
 * The "names" array of a request, which must hold exactly "num" entries.
 */
pub(crate) fn counted_names(attrs: &AttrList) -> Result<Vec<String>, TiError> {
    let num = attrs.lookup_u32(keys::ti::NUM)?;
    let names = attrs.lookup_string_array(keys::ti::NAMES)?;
    if names.len() != num as usize {
        return inval(format!("{} names given but num is {}", names.len(),
            num));
    }
    if let Some(n) = names.iter().find(|n| n.is_empty() || n.starts_with('/')) {
        return inval(format!("invalid dataset name \"{}\"", n));
    }
    Ok(names.to_vec())
}

/**
 * One instantiation back-end.  Requests are checked as the back-end is
 * constructed from the attribute list; anything that needs the host is
 * checked in the first milestone.
 */
pub(crate) trait Backend {
    type Step: Copy + fmt::Display;

    fn plan(&self) -> Vec<Self::Step>;

    fn run(&mut self, env: &mut Env<'_, '_>, step: Self::Step)
        -> Result<(), TiError>;
}

/**
 * Drive geometry as reported by discovery.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub nheads: u32,
    pub nsectors: u32,
    pub blocks: u64,
    pub blocksize: u32,
}

impl Geometry {
    pub fn cylinder(&self) -> u64 {
        self.nheads as u64 * self.nsectors as u64
    }

    pub fn ncyl(&self) -> u64 {
        match self.cylinder() {
            0 => 0,
            c => self.blocks / c,
        }
    }
}

/**
 * What a back-end may use while it runs one milestone.
 */
pub(crate) struct Env<'e, 'p> {
    log: &'e Logger,
    exec: &'e dyn Executor,
    storage: &'e dyn StorageProvider,
    zfs: &'e dyn ZfsProvider,
    dry_run: bool,
    progress: &'e mut Progress<'p>,
}

impl<'e, 'p> Env<'e, 'p> {
    pub(crate) fn log(&self) -> &Logger {
        self.log
    }

    pub(crate) fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub(crate) fn zfs(&self) -> &dyn ZfsProvider {
        self.zfs
    }

    /**
     * Run a command that changes the host.  In dry-run mode the command is
     * logged and None is returned.
     */
    pub(crate) fn run(&self, cmd: &mut Command)
        -> Result<Option<Output>, TiError>
    {
        if self.dry_run {
            info!(self.log, "dry run: {}", command_to_string(cmd));
            return Ok(None);
        }

        info!(self.log, "exec: {}", command_to_string(cmd));
        self.exec.execute(cmd)
            .map(Some)
            .map_err(|e| TiError::from_exec(self.log, &e))
    }

    /**
     * Run a command that only inspects the host, even in dry-run mode.
     */
    pub(crate) fn query(&self, cmd: &mut Command) -> Result<Output, TiError> {
        self.exec.execute(cmd).map_err(|e| TiError::from_exec(self.log, &e))
    }

    /**
     * Report progress through the current milestone.
     */
    pub(crate) fn update(&mut self, done: u32) {
        self.progress.update(done);
    }

    /**
     * Find a drive by its ctds name.
     */
    pub(crate) fn drive(&self, disk: &str) -> Result<Descriptor, TiError> {
        let drives = storage::list_drives(self.log, self.storage)
            .map_err(TiError::system)?;

        for d in drives.iter() {
            let alias = self.storage.alias(d).map_err(TiError::system)?;
            if alias.as_deref().unwrap_or(&d.name) == disk {
                return Ok(d.clone());
            }
        }
        Err(TiError::NoDevice(disk.to_string()))
    }

    pub(crate) fn geometry(&self, disk: &str) -> Result<Geometry, TiError> {
        let d = self.drive(disk)?;
        let a = crate::translate::drive(self.log, &d.attrs)
            .map_err(TiError::system)?;

        let geom = Geometry {
            nheads: a.lookup_u32(keys::disk::NHEADS).optional()?.unwrap_or(0),
            nsectors: a.lookup_u32(keys::disk::NSECTORS).optional()?
                .unwrap_or(0),
            blocks: a.lookup_u64(keys::disk::SIZE).optional()?.unwrap_or(0),
            blocksize: a.lookup_u32(keys::disk::BLOCKSIZE).optional()?
                .unwrap_or(0),
        };
        debug!(self.log, "{} geometry {:?}", disk, geom);

        if geom.cylinder() == 0 || geom.ncyl() == 0 {
            return Err(TiError::NoDevice(format!(
                "{} does not report a usable geometry", disk)));
        }
        Ok(geom)
    }

    /**
     * Partitions and slices of a drive.
     */
    pub(crate) fn partitions(&self, d: &Descriptor)
        -> Result<Vec<Descriptor>, TiError>
    {
        self.storage.partitions(d).map_err(TiError::system)
    }

    pub(crate) fn slices(&self, d: &Descriptor)
        -> Result<Vec<Descriptor>, TiError>
    {
        self.storage.slices(d).map_err(TiError::system)
    }
}

/**
 * Everything needed to carry out instantiation requests on a host.
 */
pub struct TiContext {
    log: Logger,
    exec: BoxedExecutor,
    storage: Arc<dyn StorageProvider>,
    zfs: Arc<dyn ZfsProvider>,
    dry_run: bool,
}

impl TiContext {
    /**
     * The context samples the process-wide dry-run gate when it is created.
     */
    pub fn new(
        log: &Logger,
        exec: BoxedExecutor,
        storage: Arc<dyn StorageProvider>,
        zfs: Arc<dyn ZfsProvider>,
    ) -> TiContext {
        TiContext {
            log: component(log, "ti"),
            exec,
            storage,
            zfs,
            dry_run: dryrun::dry_run(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> TiContext {
        self.dry_run = dry_run;
        self
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /**
     * Carry out a request, reporting each milestone to the callback.  A
     * failure is also reported to the callback as an error event.
     */
    pub fn create_target(
        &self,
        attrs: &AttrList,
        cb: Option<ProgressFn<'_>>,
    ) -> Result<(), TiError> {
        let mut progress = Progress::new(cb);

        let res = self.dispatch(attrs, &mut progress);
        if let Err(e) = &res {
            error!(self.log, "request failed: {}", e);
            progress.error(e.code());
        }
        res
    }

    /**
     * The milestones a request would run, without running any of them.
     */
    pub fn plan(&self, attrs: &AttrList) -> Result<Vec<String>, TiError> {
        fn names<B: Backend>(b: B) -> Vec<String> {
            b.plan().iter().map(|s| s.to_string()).collect()
        }

        Ok(match target_type(attrs)? {
            TargetType::Fdisk => names(fdisk::Fdisk::from_attrs(attrs)?),
            TargetType::Vtoc => names(vtoc::Vtoc::from_attrs(attrs)?),
            TargetType::ZfsRpool => names(zfs_pool::RootPool::from_attrs(attrs)?),
            TargetType::ZfsFs => names(zfs_fs::Filesystems::from_attrs(attrs)?),
            TargetType::ZfsVol => names(zfs_vol::Volumes::from_attrs(attrs)?),
            TargetType::Be => names(be::BootEnv::from_attrs(attrs)?),
            TargetType::DcRamdisk => names(ramdisk::Ramdisk::from_attrs(attrs)?),
            TargetType::DcUfs => names(dir::Stager::from_attrs(attrs)?),
        })
    }

    fn dispatch(&self, attrs: &AttrList, progress: &mut Progress<'_>)
        -> Result<(), TiError>
    {
        let tt = target_type(attrs)?;
        info!(self.log, "creating {} target{}", tt,
            if self.dry_run { " (dry run)" } else { "" });

        match tt {
            TargetType::Fdisk => {
                let mut b = fdisk::Fdisk::from_attrs(attrs)?;
                self.execute(&mut b, progress)
            }
            TargetType::Vtoc => {
                let mut b = vtoc::Vtoc::from_attrs(attrs)?;
                self.execute(&mut b, progress)
            }
            TargetType::ZfsRpool => {
                let mut b = zfs_pool::RootPool::from_attrs(attrs)?;
                self.execute(&mut b, progress)
            }
            TargetType::ZfsFs => {
                let mut b = zfs_fs::Filesystems::from_attrs(attrs)?;
                self.execute(&mut b, progress)
            }
            TargetType::ZfsVol => {
                let mut b = zfs_vol::Volumes::from_attrs(attrs)?;
                self.execute(&mut b, progress)
            }
            TargetType::Be => {
                let mut b = be::BootEnv::from_attrs(attrs)?;
                self.execute(&mut b, progress)
            }
            TargetType::DcRamdisk => {
                let mut b = ramdisk::Ramdisk::from_attrs(attrs)?;
                self.execute(&mut b, progress)
            }
            TargetType::DcUfs => {
                let mut b = dir::Stager::from_attrs(attrs)?;
                self.execute(&mut b, progress)
            }
        }
    }

    fn execute<B: Backend>(&self, b: &mut B, progress: &mut Progress<'_>)
        -> Result<(), TiError>
    {
        let plan = b.plan();
        let n = plan.len();
        debug!(self.log, "plan: {}", plan.iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", "));

        progress.start(n as u32);
        for (i, step) in plan.into_iter().enumerate() {
            if progress.cancelled() {
                warn!(self.log, "cancelled before milestone {}/{}", i + 1, n);
                return Err(TiError::Cancelled);
            }

            progress.begin(i as u32 + 1);
            info!(self.log, "milestone {}/{}: {}", i + 1, n, step);

            let mut env = Env {
                log: &self.log,
                exec: &*self.exec,
                storage: &*self.storage,
                zfs: &*self.zfs,
                dry_run: self.dry_run,
                progress: &mut *progress,
            };
            b.run(&mut env, step)?;

            progress.end();
        }

        Ok(())
    }
}

fn target_type(attrs: &AttrList) -> Result<TargetType, TiError> {
    let v = attrs.lookup_u32(keys::ti::TARGET_TYPE)?;
    TargetType::from_u32(v).ok_or_else(|| {
        TiError::InvalArg(format!("unknown target type {}", v))
    })
}
