/*
 * Copyright 2026 Oxide Computer Company
 */

//! The ZFS provider for the running system, built on zpool(1M).

use super::*;
use crate::exec::{self, BoxedExecutor, ExecutionError};
use std::collections::HashMap;
use std::process::Command;

pub struct HostZfs {
    log: Logger,
    exec: BoxedExecutor,
}

impl HostZfs {
    pub fn new(log: &Logger, exec: BoxedExecutor) -> HostZfs {
        HostZfs { log: component(log, "zfs"), exec }
    }

    fn zpool(&self, args: &[&str]) -> Result<String> {
        let out = self.exec.execute(Command::new(exec::ZPOOL).args(args))?;
        exec::stdout_string(&out)
    }

    fn record(&self, pool: &str) -> Result<PoolRecord> {
        let props = parse_get(&self.zpool(&["get", "-Hp", "-o", "property,value",
            "guid,health,size,capacity,version,bootfs", pool])?);
        let mut blocks = parse_status(&self.zpool(&["status", "-p", pool])?)?;
        if blocks.len() != 1 || blocks[0].name != pool {
            bail!("zpool status {}: unexpected output", pool);
        }
        let b = blocks.remove(0);

        let num = |p: &str| -> u64 {
            props.get(p).and_then(|v| v.trim_end_matches('%').parse().ok())
                .unwrap_or(0)
        };
        let version = match props.get("version").map(String::as_str) {
            Some("-") | None => SPA_VERSION_FEATURES,
            Some(v) => v.parse().unwrap_or(SPA_VERSION_FEATURES),
        };
        let bootfs = props.get("bootfs")
            .filter(|v| v.as_str() != "-")
            .cloned();

        Ok(PoolRecord {
            name: pool.to_string(),
            guid: num("guid"),
            health: props.get("health").cloned().unwrap_or(b.state),
            status: b.status,
            size: num("size"),
            capacity: num("capacity") as u32,
            version,
            bootfs,
            vdevs: b.vdevs,
            l2cache: b.l2cache,
            spares: b.spares,
        })
    }
}

impl ZfsProvider for HostZfs {
    fn imported(&self) -> Result<Vec<PoolRecord>> {
        let out = self.zpool(&["list", "-Hpo", "name"])?;
        let mut res = Vec::new();
        for pool in out.lines().map(str::trim).filter(|l| !l.is_empty()) {
            res.push(self.record(pool)?);
        }
        debug!(self.log, "{} imported pools", res.len());
        Ok(res)
    }

    fn importable(&self) -> Result<Vec<PoolRecord>> {
        let out = match self.zpool(&["import", "-d", "/dev/dsk"]) {
            Ok(out) => out,
            Err(e) => match e.downcast_ref::<ExecutionError>() {
                Some(ee) if ee.stderr()
                    .map(|s| s.contains("no pools available"))
                    .unwrap_or(false) => return Ok(Vec::new()),
                _ => return Err(e),
            },
        };

        let res: Vec<PoolRecord> = parse_status(&out)?.into_iter().map(|b| {
            PoolRecord {
                name: b.name,
                guid: b.id.unwrap_or(0),
                health: b.state,
                status: b.status,
                vdevs: b.vdevs,
                l2cache: b.l2cache,
                spares: b.spares,
                ..Default::default()
            }
        }).collect();
        debug!(self.log, "{} importable pools", res.len());
        Ok(res)
    }
}

/**
 * Parse "zpool get -Hp -o property,value" output.
 */
pub fn parse_get(out: &str) -> HashMap<String, String> {
    out.lines()
        .filter_map(|l| l.split_once('\t'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

#[derive(Debug, Default, PartialEq)]
pub struct StatusBlock {
    pub name: String,
    pub id: Option<u64>,
    pub state: String,
    pub status: u32,
    pub vdevs: Vec<Vdev>,
    pub l2cache: Vec<Vdev>,
    pub spares: Vec<Vdev>,
}

pub fn status_code(text: Option<&str>) -> u32 {
    let Some(t) = text else {
        return STATUS_OK;
    };
    if t.contains("could not be opened") {
        STATUS_MISSING_DEV
    } else if t.contains("unrecoverable error") {
        STATUS_FAILING_DEV
    } else if t.contains("taken offline") {
        STATUS_OFFLINE_DEV
    } else if t.contains("removed") {
        STATUS_REMOVED_DEV
    } else if t.contains("corrupt") {
        STATUS_CORRUPT_DATA
    } else if t.contains("resilver") {
        STATUS_RESILVERING
    } else if t.contains("legacy on-disk format") {
        STATUS_VERSION_OLDER
    } else if t.contains("features are not enabled") {
        STATUS_FEAT_DISABLED
    } else {
        STATUS_UNKNOWN
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Pool,
    Logs,
    Cache,
    Spares,
}

struct Tree {
    section: Section,
    stack: Vec<(usize, Vdev)>,
    vdevs: Vec<Vdev>,
    l2cache: Vec<Vdev>,
    spares: Vec<Vdev>,
}

impl Tree {
    fn new() -> Tree {
        Tree {
            section: Section::Pool,
            stack: Vec::new(),
            vdevs: Vec::new(),
            l2cache: Vec::new(),
            spares: Vec::new(),
        }
    }

    fn close_to(&mut self, depth: usize) {
        while self.stack.last().map(|(d, _)| *d >= depth).unwrap_or(false) {
            let Some((_, v)) = self.stack.pop() else {
                break;
            };
            match self.stack.last_mut() {
                Some((_, parent)) => parent.children.push(v),
                None => match self.section {
                    Section::Pool | Section::Logs => self.vdevs.push(v),
                    Section::Cache => self.l2cache.push(v),
                    Section::Spares => self.spares.push(v),
                },
            }
        }
    }

    fn add(&mut self, depth: usize, t: &[&str]) {
        self.close_to(depth);

        let counter = |i: usize| t.get(i).and_then(|c| c.parse().ok()).unwrap_or(0);
        let state = t.get(1).copied().unwrap_or("");
        let v = Vdev {
            name: t[0].to_string(),
            health: state.to_string(),
            read_errors: counter(2),
            write_errors: counter(3),
            checksum_errors: counter(4),
            children: Vec::new(),
            is_log: self.section == Section::Logs && depth == 1,
            is_hole: t[0].starts_with("hole"),
            spared: self.section == Section::Spares && state == "INUSE",
        };
        self.stack.push((depth, v));
    }
}

/*
 * Parse the device tree from the "config:" section.  Each line begins with a
 * tab, and each level of nesting adds two spaces.
 */
fn parse_config<'a, I>(lines: &mut std::iter::Peekable<I>) -> Tree
where
    I: Iterator<Item = &'a str>,
{
    let mut tree = Tree::new();

    while let Some(l) = lines.peek() {
        let t = l.trim_start();
        if t.starts_with("errors:") || t.starts_with("pool:") {
            break;
        }
        let l = lines.next().unwrap_or_default();
        let Some(body) = l.strip_prefix('\t') else {
            continue;
        };
        let tokens: Vec<&str> = body.split_whitespace().collect();
        if tokens.is_empty() || tokens[0] == "NAME" {
            continue;
        }
        let depth = (body.len() - body.trim_start_matches(' ').len()) / 2;

        if depth == 0 {
            tree.close_to(0);
            tree.section = match (tokens[0], tokens.len()) {
                ("logs", 1) => Section::Logs,
                ("cache", 1) => Section::Cache,
                ("spares", 1) => Section::Spares,
                /*
                 * The root row names the pool itself; special and dedup
                 * devices are reported as ordinary top-level devices.
                 */
                _ => Section::Pool,
            };
            continue;
        }

        tree.add(depth, &tokens);
    }

    tree.close_to(0);
    tree
}

/**
 * Parse the output of "zpool status" or "zpool import", one block per pool.
 */
pub fn parse_status(out: &str) -> Result<Vec<StatusBlock>> {
    let mut res: Vec<StatusBlock> = Vec::new();
    let mut lines = out.lines().peekable();

    while let Some(l) = lines.next() {
        let t = l.trim();
        let Some((key, val)) = t.split_once(':') else {
            continue;
        };
        let val = val.trim();

        if key == "pool" {
            res.push(StatusBlock { name: val.to_string(), ..Default::default() });
            continue;
        }
        let Some(b) = res.last_mut() else {
            continue;
        };
        match key {
            "id" => b.id = Some(val.parse()
                .with_context(|| format!("pool id {:?}", val))?),
            "state" => {
                b.state = if val.contains("DESTROYED") {
                    "DESTROYED".to_string()
                } else {
                    val.to_string()
                };
            }
            "status" => b.status = status_code(Some(val)),
            "config" => {
                let tree = parse_config(&mut lines);
                b.vdevs = tree.vdevs;
                b.l2cache = tree.l2cache;
                b.spares = tree.spares;
            }
            _ => {}
        }
    }

    Ok(res)
}
