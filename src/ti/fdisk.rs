/*
 * Copyright 2026 Oxide Computer Company
 */

//! Writing an fdisk partition table.

use super::{inval, Backend, Env, Geometry, TiError};
use crate::attrs::{AttrList, Optional};
use crate::common::*;
use crate::exec::FDISK;
use crate::keys::fdisk::{ACTIVE, FD_NUMPART, MAX_CYL, SUNIXOS2};
use crate::keys::ti as k;
use std::fmt;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FdiskEntry {
    pub id: u32,
    pub bootid: u32,
    pub bhead: u32,
    pub bsect: u32,
    pub bcyl: u32,
    pub ehead: u32,
    pub esect: u32,
    pub ecyl: u32,
    pub rsect: u32,
    pub numsect: u32,
}

impl FdiskEntry {
    fn end(&self) -> u64 {
        self.rsect as u64 + self.numsect as u64
    }
}

/**
 * A single active Solaris2 partition covering every whole cylinder after the
 * first track.
 */
pub fn whole_disk_entry(g: &Geometry) -> FdiskEntry {
    let ncyl = g.ncyl();
    let total = ncyl * g.cylinder() - g.nsectors as u64;

    FdiskEntry {
        id: SUNIXOS2,
        bootid: ACTIVE,
        bhead: 1,
        bsect: 1,
        bcyl: 0,
        ehead: g.nheads.saturating_sub(1),
        esect: g.nsectors,
        ecyl: ncyl.saturating_sub(1).min(MAX_CYL as u64) as u32,
        rsect: g.nsectors,
        numsect: total.min(u32::MAX as u64) as u32,
    }
}

/**
 * Check a table against the MBR rules: at most four entries and one active
 * entry, and used entries in disjoint ranges after the first sector that fit
 * on the disk.
 */
pub fn validate_table(table: &[FdiskEntry], blocks: u64) -> Result<(), TiError> {
    if table.is_empty() || table.len() > FD_NUMPART {
        return inval(format!("an fdisk table has 1 to {} entries, not {}",
            FD_NUMPART, table.len()));
    }

    if table.iter().filter(|e| e.bootid & ACTIVE != 0).count() > 1 {
        return inval("more than one partition is marked active".into());
    }

    let mut used: Vec<&FdiskEntry> = table.iter().filter(|e| e.id != 0)
        .collect();
    for e in used.iter() {
        if e.numsect == 0 || e.rsect == 0 {
            return inval(format!("partition of type {:#x} at {} has an \
                invalid extent of {} sectors", e.id, e.rsect, e.numsect));
        }
        if e.end() > blocks {
            return inval(format!("partition at {} extends past the end of \
                the disk ({} > {})", e.rsect, e.end(), blocks));
        }
    }

    used.sort_by_key(|e| e.rsect);
    for w in used.windows(2) {
        if w[0].end() > w[1].rsect as u64 {
            return inval(format!("partitions at {} and {} overlap",
                w[0].rsect, w[1].rsect));
        }
    }

    Ok(())
}

/**
 * Render a table in the form "fdisk -F" reads, padded to four entries.
 */
pub fn format_table(table: &[FdiskEntry]) -> String {
    let mut out = String::new();
    for i in 0..FD_NUMPART {
        let e = table.get(i).copied().unwrap_or_default();
        out.push_str(&format!("{} {} {} {} {} {} {} {} {} {}\n",
            e.id, e.bootid, e.bhead, e.bsect, e.bcyl, e.ehead, e.esect,
            e.ecyl, e.rsect, e.numsect));
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Validate,
    Format,
    Commit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", match self {
            Step::Validate => "validate",
            Step::Format => "format",
            Step::Commit => "commit",
        })
    }
}

pub struct Fdisk {
    disk: String,
    whole_disk: bool,
    table: Vec<FdiskEntry>,
    file: Option<NamedTempFile>,
}

impl Fdisk {
    pub fn from_attrs(attrs: &AttrList) -> Result<Fdisk, TiError> {
        let disk = attrs.lookup_string(k::DISK_NAME)?.to_string();
        if disk.is_empty() || disk.contains('/') {
            return inval(format!("invalid disk name \"{}\"", disk));
        }

        let whole_disk = attrs.lookup_bool(k::WHOLE_DISK).optional()?
            .unwrap_or(false);
        if whole_disk {
            return Ok(Fdisk { disk, whole_disk, table: Vec::new(), file: None });
        }

        let cols = [
            k::IDS, k::ACTIVE, k::BHEADS, k::BSECTS, k::BCYLS, k::EHEADS,
            k::ESECTS, k::ECYLS, k::RSECTS, k::NUMSECTS,
        ].iter().map(|n| attrs.lookup_u32_array(n))
            .collect::<Result<Vec<_>, _>>()?;

        let n = cols[0].len();
        if cols.iter().any(|c| c.len() != n) {
            return inval("partition arrays differ in length".into());
        }

        let table = (0..n).map(|i| FdiskEntry {
            id: cols[0][i],
            bootid: cols[1][i],
            bhead: cols[2][i],
            bsect: cols[3][i],
            bcyl: cols[4][i],
            ehead: cols[5][i],
            esect: cols[6][i],
            ecyl: cols[7][i],
            rsect: cols[8][i],
            numsect: cols[9][i],
        }).collect::<Vec<_>>();

        if table.is_empty() || table.len() > FD_NUMPART {
            return inval(format!("an fdisk table has 1 to {} entries, not {}",
                FD_NUMPART, table.len()));
        }

        Ok(Fdisk { disk, whole_disk, table, file: None })
    }

    fn validate(&mut self, env: &Env<'_, '_>) -> Result<(), TiError> {
        let g = env.geometry(&self.disk)?;
        if self.whole_disk {
            self.table = vec![whole_disk_entry(&g)];
        }
        validate_table(&self.table, g.blocks)?;

        for (i, e) in self.table.iter().enumerate() {
            debug!(env.log(), "{}p{}: {:?}", self.disk, i + 1, e);
        }
        Ok(())
    }

    fn format(&mut self) -> Result<(), TiError> {
        let mut f = NamedTempFile::new()
            .map_err(|e| TiError::system(e.into()))?;
        f.write_all(format_table(&self.table).as_bytes())
            .and_then(|_| f.flush())
            .map_err(|e| TiError::system(e.into()))?;
        self.file = Some(f);
        Ok(())
    }

    fn commit(&self, env: &Env<'_, '_>) -> Result<(), TiError> {
        let Some(f) = self.file.as_ref() else {
            return Err(TiError::SystemErr("fdisk table was not formatted"
                .into()));
        };

        env.run(Command::new(FDISK)
            .arg("-F")
            .arg(f.path())
            .arg(format!("/dev/rdsk/{}p0", self.disk)))?;
        info!(env.log(), "wrote fdisk table to {}", self.disk);
        Ok(())
    }
}

impl Backend for Fdisk {
    type Step = Step;

    fn plan(&self) -> Vec<Step> {
        vec![Step::Validate, Step::Format, Step::Commit]
    }

    fn run(&mut self, env: &mut Env<'_, '_>, step: Step) -> Result<(), TiError> {
        match step {
            Step::Validate => self.validate(env),
            Step::Format => self.format(),
            Step::Commit => self.commit(env),
        }
    }
}
