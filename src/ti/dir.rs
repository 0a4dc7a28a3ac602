/*
 * Copyright 2026 Oxide Computer Company
 */

//! Staging a destination directory.

use super::{inval, Backend, Env, TiError};
use crate::attrs::AttrList;
use crate::common::*;
use crate::file;
use crate::keys::ti as k;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateDest,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "create_dest")
    }
}

pub struct Stager {
    dest: String,
}

impl Stager {
    pub fn from_attrs(attrs: &AttrList) -> Result<Stager, TiError> {
        let dest = attrs.lookup_string(k::DEST)?.to_string();
        if !dest.starts_with('/') {
            return inval(format!("\"{}\" is not an absolute path", dest));
        }
        Ok(Stager { dest })
    }

    fn create(&self, env: &Env<'_, '_>) -> Result<(), TiError> {
        if file::exists_dir(&self.dest).map_err(TiError::system)? {
            debug!(env.log(), "{} already exists", self.dest);
            return Ok(());
        }

        if env.dry_run() {
            info!(env.log(), "dry run: mkdir -p {}", self.dest);
            return Ok(());
        }

        file::ensure_dir(env.log(), &self.dest).map_err(TiError::system)?;
        Ok(())
    }
}

impl Backend for Stager {
    type Step = Step;

    fn plan(&self) -> Vec<Step> {
        vec![Step::CreateDest]
    }

    fn run(&mut self, env: &mut Env<'_, '_>, step: Step) -> Result<(), TiError> {
        match step {
            Step::CreateDest => self.create(env),
        }
    }
}
