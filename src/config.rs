/*
 * Copyright 2026 Oxide Computer Company
 */

use crate::common::*;
use crate::file::read_toml;
use serde::Deserialize;

pub const CONFIG_PATH: &str = "/etc/targetadm.toml";

#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub log: ConfigLog,
    #[serde(default)]
    pub ti: ConfigTi,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct ConfigLog {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for ConfigLog {
    fn default() -> Self {
        ConfigLog { level: default_level() }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct ConfigTi {
    #[serde(default)]
    pub dry_run: bool,
}

impl Config {
    /**
     * Load the configuration file.  A missing file produces the defaults.
     */
    pub fn load(path: &str) -> Result<Config> {
        let c: Config = read_toml(path)?.unwrap_or_default();
        crate::logging::parse_level(&c.log.level)?;
        Ok(c)
    }

    pub fn log_level(&self) -> Result<slog::Level> {
        crate::logging::parse_level(&self.log.level)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn config_empty() -> Result<()> {
        let c: Config = toml::from_str("")?;
        println!("{:#?}", c);
        assert_eq!(c, Config::default());
        assert_eq!(c.log.level, "info");
        assert!(!c.ti.dry_run);
        Ok(())
    }

    #[test]
    fn config_partial() -> Result<()> {
        let c: Config = toml::from_str("[ti]\ndry_run = true\n")?;
        println!("{:#?}", c);
        assert!(c.ti.dry_run);
        assert_eq!(c.log_level()?, slog::Level::Info);
        Ok(())
    }

    #[test]
    fn config_file() -> Result<()> {
        let td = tempfile::tempdir()?;
        let p = td.path().join("targetadm.toml");
        crate::file::write_file(&p, "[log]\nlevel = \"debug\"\n")?;

        let c = Config::load(p.to_str().unwrap())?;
        assert_eq!(c.log_level()?, slog::Level::Debug);

        let missing = td.path().join("missing.toml");
        assert_eq!(Config::load(missing.to_str().unwrap())?, Config::default());

        crate::file::write_file(&p, "[log]\nlevel = \"loud\"\n")?;
        assert!(Config::load(p.to_str().unwrap()).is_err());
        Ok(())
    }
}
