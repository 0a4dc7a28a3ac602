/*
 * Copyright 2026 Oxide Computer Company
 */

//! Writing a VTOC slice table.

use super::{inval, Backend, Env, TiError};
use crate::attrs::{AttrList, Optional};
use crate::common::*;
use crate::exec::FMTHARD;
use crate::keys::fdisk::{SUNIXOS, SUNIXOS2};
use crate::keys::ti as k;
use crate::keys::vtoc::{BACKUP_SLICE, NUMPART, V_BACKUP, V_ROOT, V_UNMNT};
use crate::storage::dm::{DM_NSECTORS, DM_PTYPE};
use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceSpec {
    pub index: u32,
    pub tag: u32,
    pub flag: u32,
    pub first: u64,
    pub size: u64,
}

impl SliceSpec {
    /**
     * One past the last sector, or None if that is not representable.
     */
    fn end(&self) -> Option<u64> {
        self.first.checked_add(self.size)
    }
}

/**
 * Slice 0 as root over every cylinder but the first, and the backup slice
 * over the whole area.
 */
pub fn default_layout(cyl: u64, ncyl: u64) -> Vec<SliceSpec> {
    vec![
        SliceSpec {
            index: 0,
            tag: V_ROOT,
            flag: 0,
            first: cyl,
            size: (ncyl - 1) * cyl,
        },
        SliceSpec {
            index: BACKUP_SLICE,
            tag: V_BACKUP,
            flag: V_UNMNT,
            first: 0,
            size: ncyl * cyl,
        },
    ]
}

fn check_indices(slices: &[SliceSpec]) -> Result<(), TiError> {
    let mut seen = HashSet::new();
    for s in slices {
        if s.index >= NUMPART {
            return inval(format!("slice index {} is out of range", s.index));
        }
        if !seen.insert(s.index) {
            return inval(format!("slice {} is given twice", s.index));
        }
    }
    Ok(())
}

/**
 * Check a slice table against an area of "whole" sectors: one backup slice
 * covering all of it, and every other slice inside it and disjoint from the
 * rest.
 */
pub fn validate_slices(slices: &[SliceSpec], whole: u64) -> Result<(), TiError> {
    check_indices(slices)?;

    let backups = slices.iter().filter(|s| s.tag == V_BACKUP)
        .collect::<Vec<_>>();
    match backups.as_slice() {
        [b] if b.first == 0 && b.size == whole => (),
        [b] => {
            return inval(format!("backup slice {} covers {}+{}, not the \
                whole {} sectors", b.index, b.first, b.size, whole));
        }
        _ => {
            return inval(format!("{} backup slices given; there must be \
                exactly one", backups.len()));
        }
    }

    let mut used = Vec::new();
    for s in slices.iter().filter(|s| s.tag != V_BACKUP && s.size > 0) {
        match s.end() {
            Some(end) if end <= whole => used.push((s, end)),
            _ => {
                return inval(format!("slice {} at {}+{} extends past {}",
                    s.index, s.first, s.size, whole));
            }
        }
    }

    used.sort_by_key(|(s, _)| s.first);
    for w in used.windows(2) {
        let ((a, end), (b, _)) = (w[0], w[1]);
        if end > b.first {
            return inval(format!("slices {} and {} overlap", a.index,
                b.index));
        }
    }

    Ok(())
}

/**
 * Render slices in the form "fmthard -s" reads.
 */
pub fn format_slices(slices: &[SliceSpec]) -> String {
    let mut sorted = slices.to_vec();
    sorted.sort_by_key(|s| s.index);

    let mut out = String::new();
    for s in sorted {
        out.push_str(&format!("{} {} {:02x} {} {}\n", s.index, s.tag, s.flag,
            s.first, s.size));
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Validate,
    ReadGeometry,
    WriteVtoc,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", match self {
            Step::Validate => "validate",
            Step::ReadGeometry => "read_geometry",
            Step::WriteVtoc => "write_vtoc",
        })
    }
}

pub struct Vtoc {
    disk: String,
    default_layout: bool,
    slices: Vec<SliceSpec>,
}

impl Vtoc {
    pub fn from_attrs(attrs: &AttrList) -> Result<Vtoc, TiError> {
        let disk = attrs.lookup_string(k::DISK_NAME)?.to_string();
        if disk.is_empty() || disk.contains('/') {
            return inval(format!("invalid disk name \"{}\"", disk));
        }

        if attrs.lookup_bool(k::DEFAULT_LAYOUT).optional()?.unwrap_or(false) {
            return Ok(Vtoc { disk, default_layout: true, slices: Vec::new() });
        }

        let parts = attrs.lookup_u32_array(k::PARTS)?;
        let tags = attrs.lookup_u32_array(k::TAGS)?;
        let flags = attrs.lookup_u32_array(k::FLAGS)?;
        let firsts = attrs.lookup_u64_array(k::FIRST_SECTORS)?;
        let sizes = attrs.lookup_u64_array(k::SIZES)?;

        let n = parts.len();
        if n == 0 {
            return inval("no slices given".into());
        }
        if [tags.len(), flags.len(), firsts.len(), sizes.len()].iter()
            .any(|l| *l != n)
        {
            return inval("slice arrays differ in length".into());
        }

        let slices = (0..n).map(|i| SliceSpec {
            index: parts[i],
            tag: tags[i],
            flag: flags[i],
            first: firsts[i],
            size: sizes[i],
        }).collect();

        Ok(Vtoc { disk, default_layout: false, slices })
    }

    pub fn slices(&self) -> &[SliceSpec] {
        &self.slices
    }

    /**
     * The sectors the label may describe: the Solaris fdisk partition if the
     * disk has one, otherwise the whole disk.
     */
    fn area(&self, env: &Env<'_, '_>, blocks: u64) -> Result<u64, TiError> {
        let d = env.drive(&self.disk)?;
        let mut solaris = None;
        for p in env.partitions(&d)? {
            let id = p.attrs.lookup_u32(DM_PTYPE).optional()?;
            let size = p.attrs.lookup_u32(DM_NSECTORS).optional()?;
            match (id, size) {
                (Some(SUNIXOS2), Some(n)) => {
                    solaris = Some(n as u64);
                    break;
                }
                (Some(SUNIXOS), Some(n)) if solaris.is_none() => {
                    solaris = Some(n as u64);
                }
                _ => (),
            }
        }

        Ok(match solaris {
            Some(n) => {
                debug!(env.log(), "{}: Solaris partition of {} sectors",
                    self.disk, n);
                n
            }
            None => blocks,
        })
    }

    fn read_geometry(&mut self, env: &Env<'_, '_>) -> Result<(), TiError> {
        let g = env.geometry(&self.disk)?;
        let cyl = g.cylinder();
        let ncyl = self.area(env, g.blocks)? / cyl;
        if ncyl < 2 {
            return inval(format!("{} is too small for a VTOC", self.disk));
        }

        if self.default_layout {
            self.slices = default_layout(cyl, ncyl);
        }
        validate_slices(&self.slices, ncyl * cyl)?;

        for s in self.slices.iter() {
            debug!(env.log(), "{}s{}: {:?}", self.disk, s.index, s);
        }
        Ok(())
    }

    fn write(&self, env: &Env<'_, '_>) -> Result<(), TiError> {
        let mut f = NamedTempFile::new()
            .map_err(|e| TiError::system(e.into()))?;
        f.write_all(format_slices(&self.slices).as_bytes())
            .and_then(|_| f.flush())
            .map_err(|e| TiError::system(e.into()))?;

        env.run(Command::new(FMTHARD)
            .arg("-s")
            .arg(f.path())
            .arg(format!("/dev/rdsk/{}s2", self.disk)))?;
        info!(env.log(), "wrote VTOC with {} slices to {}", self.slices.len(),
            self.disk);
        Ok(())
    }
}

impl Backend for Vtoc {
    type Step = Step;

    fn plan(&self) -> Vec<Step> {
        vec![Step::Validate, Step::ReadGeometry, Step::WriteVtoc]
    }

    fn run(&mut self, env: &mut Env<'_, '_>, step: Step) -> Result<(), TiError> {
        match step {
            Step::Validate => check_indices(&self.slices),
            Step::ReadGeometry => self.read_geometry(env),
            Step::WriteVtoc => self.write(env),
        }
    }
}
