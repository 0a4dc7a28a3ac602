/*
 * Copyright 2026 Oxide Computer Company
 */

//! Stand-ins for the host providers, for use in tests.

pub mod exec;
pub mod storage;
pub mod zfs;
