/*
 * Copyright 2026 Oxide Computer Company
 */

//! Parsing of prtvtoc(1M) output.

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtocSlice {
    pub index: u32,
    pub tag: u32,
    pub flag: u32,
    pub first: u64,
    pub count: u64,
    pub last: u64,
    pub mount: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Vtoc {
    pub sector_size: u64,
    pub sectors_per_track: Option<u64>,
    pub tracks_per_cylinder: Option<u64>,
    pub sectors_per_cylinder: Option<u64>,
    pub cylinders: Option<u64>,
    pub accessible_cylinders: Option<u64>,
    /**
     * Only an EFI label reports its size in sectors; a VTOC label describes
     * the disk in cylinders.
     */
    pub sectors: Option<u64>,
    pub accessible_sectors: Option<u64>,
    pub slices: Vec<VtocSlice>,
}

impl Vtoc {
    pub fn is_efi(&self) -> bool {
        self.sectors.is_some() && self.cylinders.is_none()
    }

    pub fn slice(&self, index: u32) -> Option<&VtocSlice> {
        self.slices.iter().find(|s| s.index == index)
    }
}

fn num(t: &str, l: &str) -> Result<u64> {
    t.parse().with_context(|| format!("prtvtoc line {:?}", l))
}

pub fn parse(out: &str) -> Result<Vtoc> {
    enum State {
        WaitingForDimensions,
        Dimensions,
        After,
    }
    let mut state = State::WaitingForDimensions;
    let mut sectorsize: Option<u64> = None;
    let mut vtoc = Vtoc::default();

    for l in out.lines() {
        match state {
            State::WaitingForDimensions => {
                if l.trim() == "* Dimensions:" {
                    state = State::Dimensions;
                }
            }
            State::Dimensions => {
                let t: Vec<_> = l.split_whitespace().collect();
                if t.len() == 1 && t[0] == "*" {
                    state = State::After;
                    continue;
                }
                if t.len() < 3 || t[0] != "*" {
                    continue;
                }
                let v = num(t[1], l)?;
                match &t[2..] {
                    ["bytes/sector"] => sectorsize = Some(v),
                    ["sectors/track"] => vtoc.sectors_per_track = Some(v),
                    ["tracks/cylinder"] => vtoc.tracks_per_cylinder = Some(v),
                    ["sectors/cylinder"] => vtoc.sectors_per_cylinder = Some(v),
                    ["cylinders"] => vtoc.cylinders = Some(v),
                    ["accessible", "cylinders"] => {
                        vtoc.accessible_cylinders = Some(v)
                    }
                    ["sectors"] => vtoc.sectors = Some(v),
                    ["accessible", "sectors"] => {
                        vtoc.accessible_sectors = Some(v)
                    }
                    _ => {}
                }
            }
            State::After => {
                let l = l.trim();
                if l.is_empty() || l.starts_with('*') {
                    continue;
                }

                let t: Vec<_> = l.split_whitespace().collect();
                if t.len() < 6 {
                    bail!("prtvtoc short slice line {:?}", l);
                }

                vtoc.slices.push(VtocSlice {
                    index: t[0].parse()
                        .with_context(|| format!("prtvtoc line {:?}", l))?,
                    tag: t[1].parse()
                        .with_context(|| format!("prtvtoc line {:?}", l))?,
                    flag: u32::from_str_radix(t[2], 16)
                        .with_context(|| format!("prtvtoc line {:?}", l))?,
                    first: num(t[3], l)?,
                    count: num(t[4], l)?,
                    last: num(t[5], l)?,
                    mount: t.get(6).map(|s| s.to_string()),
                });
            }
        }
    }

    match sectorsize {
        Some(ss) => vtoc.sector_size = ss,
        None => bail!("prtvtoc output has no dimensions: {:?}", out),
    }

    Ok(vtoc)
}
