/*
 * Copyright 2026 Oxide Computer Company
 */

//! The process-wide dry-run gate.
//!
//! Off until set_dry_run(true) is called.  Instantiation contexts sample the
//! gate when they are created, so toggling it does not affect a request that is
//! already running.

use std::sync::atomic::{AtomicBool, Ordering};

static DRY_RUN: AtomicBool = AtomicBool::new(false);

pub fn set_dry_run(on: bool) {
    DRY_RUN.store(on, Ordering::SeqCst);
}

pub fn dry_run() -> bool {
    DRY_RUN.load(Ordering::SeqCst)
}
