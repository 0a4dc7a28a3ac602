/*
 * Copyright 2026 Oxide Computer Company
 */

use crate::common::*;
use serde::Deserialize;
use std::fs::{DirBuilder, File};
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

/**
 * Create a directory, and any missing parents, if it does not already exist.
 * Returns true if anything was created.
 */
pub fn ensure_dir(log: &Logger, path: &str) -> Result<bool> {
    if exists_dir(path)? {
        return Ok(false);
    }

    info!(log, "mkdir -p {}", path);
    DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(path)
        .with_context(|| format!("mkdir {}", path))?;
    Ok(true)
}

pub fn exists_dir(p: &str) -> Result<bool> {
    let md = match std::fs::metadata(p) {
        Ok(md) => md,
        Err(e) => match e.kind() {
            ErrorKind::NotFound => return Ok(false),
            _ => bail!("checking {}: {}", p, e),
        },
    };

    if !md.is_dir() {
        bail!("\"{}\" exists but is not a directory", p);
    }

    Ok(true)
}

pub fn read_file(p: &str) -> Result<Option<String>> {
    let f = match File::open(p) {
        Ok(f) => f,
        Err(e) => {
            match e.kind() {
                ErrorKind::NotFound => return Ok(None),
                _ => bail!("open \"{}\": {}", p, e),
            };
        }
    };
    let mut r = std::io::BufReader::new(f);
    let mut out = String::new();
    r.read_to_string(&mut out)?;
    Ok(Some(out))
}

pub fn read_lines(p: &str) -> Result<Option<Vec<String>>> {
    Ok(read_file(p)?.map(|data| {
        data.lines().map(|a| a.trim().to_string()).collect()
    }))
}

/**
 * Write text to a file, replacing any previous contents.
 */
pub fn write_file<P: AsRef<Path>>(p: P, data: &str) -> Result<()> {
    let f = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(p.as_ref())?;
    let mut w = std::io::BufWriter::new(f);
    w.write_all(data.as_bytes())?;
    w.flush()?;
    Ok(())
}

pub fn read_toml<T>(p: &str) -> Result<Option<T>>
where
    for<'de> T: Deserialize<'de>,
{
    let s = read_file(p)?;
    match s {
        None => Ok(None),
        Some(s) => Ok(Some(toml::from_str(&s)
            .with_context(|| format!("parsing {}", p))?)),
    }
}

pub fn read_yaml<T>(p: &str) -> Result<Option<T>>
where
    for<'de> T: Deserialize<'de>,
{
    let s = read_file(p)?;
    match s {
        None => Ok(None),
        Some(s) => Ok(Some(serde_yaml::from_str(&s)
            .with_context(|| format!("parsing {}", p))?)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ensure_dir_creates_parents_once() -> Result<()> {
        let log = crate::logging::sink_log(|_, _, _| {});
        let td = tempfile::tempdir()?;
        let p = td.path().join("a/b/c");
        let p = p.to_str().unwrap();

        assert!(!exists_dir(p)?);
        assert!(ensure_dir(&log, p)?);
        assert!(exists_dir(p)?);
        assert!(!ensure_dir(&log, p)?);
        Ok(())
    }

    #[test]
    fn exists_dir_rejects_files() -> Result<()> {
        let td = tempfile::tempdir()?;
        let p = td.path().join("f");
        write_file(&p, "x\n")?;
        let p = p.to_str().unwrap();

        assert!(exists_dir(p).is_err());
        assert_eq!(read_lines(p)?, Some(vec!["x".to_string()]));
        assert_eq!(read_file(&format!("{}.missing", p))?, None);
        Ok(())
    }
}
