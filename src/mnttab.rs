/*
 * Copyright 2026 Oxide Computer Company
 */

use crate::common::*;
use crate::file::read_lines;
use std::collections::HashMap;

pub const MNTTAB: &str = "/etc/mnttab";

#[derive(Debug, Clone, PartialEq)]
pub enum MountOptionValue {
    Present,
    Value(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mount {
    pub special: String,
    pub mount_point: String,
    pub fstype: String,
    pub options: HashMap<String, MountOptionValue>,
    pub time: u64,
}

/**
 * Parse mnttab(5) contents into a list of mounts.  The result is a list instead
 * of a dictionary as there may be more than one mount entry for a particular
 * mount point.
 */
pub fn parse(lines: &[String]) -> Result<Vec<Mount>> {
    let mut out = Vec::new();
    for l in lines.iter().filter(|l| !l.is_empty()) {
        let r: Vec<&str> = l.split('\t').collect();
        if r.len() != 5 {
            bail!("malformed mnttab line: {:?}", l);
        }

        let mut options = HashMap::new();
        for p in r[3].split(',').filter(|p| !p.is_empty()) {
            let v = match p.split_once('=') {
                None => (p, MountOptionValue::Present),
                Some((k, v)) => (k, MountOptionValue::Value(v.to_string())),
            };
            options.insert(v.0.to_string(), v.1);
        }

        out.push(Mount {
            special: r[0].to_string(),
            mount_point: r[1].to_string(),
            fstype: r[2].to_string(),
            options,
            time: r[4].parse().with_context(|| {
                format!("mnttab time value {:?}", r[4])
            })?,
        });
    }

    Ok(out)
}

pub fn mounts() -> Result<Vec<Mount>> {
    match read_lines(MNTTAB)? {
        Some(lines) => parse(&lines),
        None => bail!("{} not found", MNTTAB),
    }
}

/**
 * The most recent mount of a given mount point.
 */
pub fn find<'a>(mounts: &'a [Mount], mount_point: &str) -> Option<&'a Mount> {
    mounts.iter().rev().find(|m| m.mount_point == mount_point)
}
