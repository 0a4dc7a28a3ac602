/*
 * Copyright 2026 Oxide Computer Company
 */

//! Discovery of installation targets on an illumos host, and instantiation of
//! new ones: partition tables, slice tables, ZFS pools, datasets and volumes,
//! boot environments and boot archive staging areas.

pub mod attrs;
pub mod common;
pub mod config;
pub mod dryrun;
pub mod exec;
pub mod file;
pub mod keys;
pub mod logging;
pub mod mnttab;
pub mod names;
pub mod probe;
pub mod progress;
pub mod request;
pub mod storage;
pub mod td;
pub mod ti;
pub mod translate;
pub mod zfs;

#[cfg(test)]
mod fakes;
