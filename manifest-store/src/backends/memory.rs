//! In-memory backend.
//!
//! Holds documents in `tokio::sync::RwLock` maps. Besides plain storage it can
//! be told to fail writes or to hold saves until released, which is how the
//! store's rollback and read-your-writes behavior are exercised in tests.

use anyhow::{Result, bail};
use async_trait::async_trait;
use manifest_core::{Dimension, YearData};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{RwLock, Semaphore};

use crate::backend::{StorageBackend, sort_year_keys};

#[derive(Default)]
pub struct InMemoryBackend {
    years: RwLock<BTreeMap<String, YearData>>,
    dimensions: RwLock<Option<Vec<Dimension>>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    save_count: AtomicUsize,
    gate: RwLock<Option<Arc<Semaphore>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored document without going through the store.
    pub async fn insert_year(&self, data: YearData) {
        self.years.write().await.insert(data.year.clone(), data);
    }

    pub async fn stored_year(&self, year: &str) -> Option<YearData> {
        self.years.read().await.get(year).cloned()
    }

    pub async fn stored_dimensions(&self) -> Option<Vec<Dimension>> {
        self.dimensions.read().await.clone()
    }

    /// Make every subsequent write fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `save_year` calls.
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    /// Hold `save_year` calls until a permit is added to the returned semaphore.
    pub async fn hold_saves(&self) -> Arc<Semaphore> {
        let sem = Arc::new(Semaphore::new(0));
        *self.gate.write().await = Some(sem.clone());
        sem
    }

    async fn wait_gate(&self) -> Result<()> {
        let gate = self.gate.read().await.clone();
        if let Some(sem) = gate {
            sem.acquire().await?.forget();
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("injected write failure");
        }
        Ok(())
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("injected read failure");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn fetch_year(&self, year: &str) -> Result<Option<YearData>> {
        self.check_read()?;
        Ok(self.years.read().await.get(year).cloned())
    }

    async fn save_year(&self, year: &str, data: &YearData) -> Result<()> {
        self.wait_gate().await?;
        self.check_write()?;
        self.years.write().await.insert(year.to_string(), data.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_year(&self, year: &str) -> Result<()> {
        self.check_write()?;
        self.years.write().await.remove(year);
        Ok(())
    }

    async fn fetch_all_year_keys(&self) -> Result<Vec<String>> {
        self.check_read()?;
        let mut keys: Vec<String> = self.years.read().await.keys().cloned().collect();
        sort_year_keys(&mut keys);
        Ok(keys)
    }

    async fn fetch_dimensions(&self) -> Result<Option<Vec<Dimension>>> {
        self.check_read()?;
        Ok(self.dimensions.read().await.clone())
    }

    async fn save_dimensions(&self, dimensions: &[Dimension]) -> Result<()> {
        self.check_write()?;
        *self.dimensions.write().await = Some(dimensions.to_vec());
        Ok(())
    }
}
