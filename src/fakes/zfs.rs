/*
 * Copyright 2026 Oxide Computer Company
 */

use crate::common::*;
use crate::zfs::{PoolRecord, ZfsProvider};

/**
 * A ZFS provider that reports a fixed set of pools.
 */
#[derive(Default)]
pub struct FakeZfs {
    imported: Vec<PoolRecord>,
    importable: Vec<PoolRecord>,
}

impl FakeZfs {
    pub fn new() -> Self {
        FakeZfs::default()
    }

    pub fn with_imported(mut self, r: PoolRecord) -> Self {
        self.imported.push(r);
        self
    }

    pub fn with_importable(mut self, r: PoolRecord) -> Self {
        self.importable.push(r);
        self
    }
}

impl ZfsProvider for FakeZfs {
    fn imported(&self) -> Result<Vec<PoolRecord>> {
        Ok(self.imported.clone())
    }

    fn importable(&self) -> Result<Vec<PoolRecord>> {
        Ok(self.importable.clone())
    }
}
