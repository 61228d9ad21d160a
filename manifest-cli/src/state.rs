use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// `~/.manifest`, unless overridden by `--home` or `MANIFEST_HOME`.
pub fn manifest_home(override_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir.to_path_buf());
    }
    if let Ok(dir) = std::env::var("MANIFEST_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".manifest"))
}

pub fn ensure_manifest_home(override_dir: Option<&Path>) -> Result<PathBuf> {
    let dir = manifest_home(override_dir)?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join("config.toml")
}
