//! Storage backend contract.
//!
//! A backend persists whole year documents keyed by year, plus the dimension
//! registry. Each call is atomic: a failed `save_year` leaves the previous
//! document in place. Backends report failures as `anyhow::Error`; the store
//! surfaces them as `StoreError::PersistenceFailure`.

use anyhow::Result;
use async_trait::async_trait;
use manifest_core::{Dimension, YearData};

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// `Ok(None)` when no document exists for `year`.
    async fn fetch_year(&self, year: &str) -> Result<Option<YearData>>;

    async fn save_year(&self, year: &str, data: &YearData) -> Result<()>;

    async fn delete_year(&self, year: &str) -> Result<()>;

    /// Every stored year key, most recent first.
    async fn fetch_all_year_keys(&self) -> Result<Vec<String>>;

    /// `Ok(None)` when no registry has been written yet.
    async fn fetch_dimensions(&self) -> Result<Option<Vec<Dimension>>>;

    async fn save_dimensions(&self, dimensions: &[Dimension]) -> Result<()>;
}

/// Sort year keys most recent first, dropping duplicates.
pub fn sort_year_keys(keys: &mut Vec<String>) {
    keys.sort_by(|a, b| b.cmp(a));
    keys.dedup();
}
