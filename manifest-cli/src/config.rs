use anyhow::{Context, Result};
use manifest_core::ScoreAggregation;
use manifest_core::time::parse_timezone;
use manifest_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::config_path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageSection,
    pub scoring: ScoringSection,
    pub clock: ClockSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory for year documents. Relative paths are resolved against the
    /// manifest home; unset means `<home>/data`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    /// "average" or "sum".
    pub aggregation: ScoreAggregation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSection {
    pub timezone: String,
}

impl Default for ClockSection {
    fn default() -> Self {
        Self {
            timezone: "Asia/Shanghai".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default tracing filter; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn data_dir(&self, home: &Path) -> PathBuf {
        match &self.storage.data_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => home.join(dir),
            None => home.join("data"),
        }
    }

    pub fn store_config(&self) -> Result<StoreConfig> {
        let tz = parse_timezone(&self.clock.timezone).context("[clock] timezone")?;
        Ok(StoreConfig::default()
            .with_aggregation(self.scoring.aggregation)
            .with_timezone(tz))
    }
}

pub fn load_config(home: &Path) -> Result<Config> {
    let p = config_path(home);
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(home: &Path, cfg: &Config) -> Result<()> {
    let p = config_path(home);
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

/// Write the default config unless one exists. Returns the path and whether
/// it was written.
pub fn init_config(home: &Path) -> Result<(PathBuf, bool)> {
    let p = config_path(home);
    if p.exists() {
        return Ok((p, false));
    }
    save_config(home, &Config::default())?;
    Ok((p, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.data_dir(dir.path()), dir.path().join("data"));
        assert_eq!(cfg.store_config().unwrap(), StoreConfig::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            config_path(dir.path()),
            "[scoring]\naggregation = \"sum\"\n\n[storage]\ndata_dir = \"years\"\n",
        )
        .unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg.scoring.aggregation, ScoreAggregation::Sum);
        assert_eq!(cfg.clock.timezone, "Asia/Shanghai");
        assert_eq!(cfg.data_dir(dir.path()), dir.path().join("years"));
    }

    #[test]
    fn init_writes_once_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let (path, written) = init_config(dir.path()).unwrap();
        assert!(written);
        assert!(path.exists());
        let (_, written) = init_config(dir.path()).unwrap();
        assert!(!written);
        assert_eq!(load_config(dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn bad_timezone_is_reported() {
        let cfg = Config {
            clock: ClockSection {
                timezone: "Nowhere/Special".into(),
            },
            ..Config::default()
        };
        assert!(cfg.store_config().is_err());
    }
}
