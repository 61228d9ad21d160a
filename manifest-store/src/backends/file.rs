//! JSON file backend.
//!
//! Layout under the data directory:
//! - `<year>.json` — one pretty-printed year document per year
//! - `dimensions.json` — the dimension registry
//!
//! Writes go to a temp file in the same directory and are renamed into place,
//! so a failed write never leaves a half-written document behind.

use anyhow::{Context, Result};
use async_trait::async_trait;
use manifest_core::{Dimension, YearData, validate_year_key};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::backend::{StorageBackend, sort_year_keys};

const DIMENSIONS_FILE: &str = "dimensions.json";

#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn year_path(&self, year: &str) -> Result<PathBuf> {
        // Keys end up in file names; only four-digit keys are accepted.
        validate_year_key(year)?;
        Ok(self.dir.join(format!("{year}.json")))
    }

    async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create {}", self.dir.display()))?;

        let body = serde_json::to_vec_pretty(value).context("serialize document")?;
        let tmp = path.with_extension(format!("json.tmp-{}", std::process::id()));
        fs::write(&tmp, &body)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("rename into {}", path.display()));
        }
        debug!(path = %path.display(), bytes = body.len(), "wrote document");
        Ok(())
    }

    async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }
}

#[async_trait]
impl StorageBackend for JsonFileBackend {
    async fn fetch_year(&self, year: &str) -> Result<Option<YearData>> {
        let path = self.year_path(year)?;
        let Some(bytes) = Self::read_optional(&path).await? else {
            return Ok(None);
        };
        let mut data: YearData = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse {}", path.display()))?;
        if data.year.is_empty() {
            data.year = year.to_string();
        }
        Ok(Some(data))
    }

    async fn save_year(&self, year: &str, data: &YearData) -> Result<()> {
        let path = self.year_path(year)?;
        self.write_json(&path, data).await
    }

    async fn delete_year(&self, year: &str) -> Result<()> {
        let path = self.year_path(year)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("delete {}", path.display())),
        }
    }

    async fn fetch_all_year_keys(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e).with_context(|| format!("list {}", self.dir.display())),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("list {}", self.dir.display()))?
        {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if validate_year_key(stem).is_ok() {
                keys.push(stem.to_string());
            }
        }
        sort_year_keys(&mut keys);
        Ok(keys)
    }

    async fn fetch_dimensions(&self) -> Result<Option<Vec<Dimension>>> {
        let path = self.dir.join(DIMENSIONS_FILE);
        let Some(bytes) = Self::read_optional(&path).await? else {
            return Ok(None);
        };
        let dims = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse {}", path.display()))?;
        Ok(Some(dims))
    }

    async fn save_dimensions(&self, dimensions: &[Dimension]) -> Result<()> {
        let path = self.dir.join(DIMENSIONS_FILE);
        self.write_json(&path, dimensions).await
    }
}
