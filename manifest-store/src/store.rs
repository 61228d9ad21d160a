//! The Performance Store.
//!
//! Every year-scoped call names its year explicitly; several years may be
//! loaded at once. Each year moves `Unloaded -> Loading -> Loaded`, and only a
//! `Loaded` year accepts mutations.
//!
//! Concurrency model:
//! - reads take a short synchronous lock on the cache and clone out; that lock
//!   is never held across an await, so reads never wait on the backend.
//! - mutations queue on a fair async mutex. Each one updates the cache,
//!   recomputes aggregates, persists, and on persist failure restores the
//!   pre-mutation snapshot before reporting `PersistenceFailure`.

use manifest_core::dimension::{dimension_id_for, merge_missing, title_taken};
use manifest_core::{
    Dimension, DimensionPatch, DimensionYearData, MONTHS, MonthSummary, NewDimension, QUARTERS,
    ScoringSettings, Task, TaskInput, TaskPatch, ValidationError, YearData, apply_patch,
    default_dimensions, normalize_year_data_with, validate_task, validate_year_key,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{StorageBackend, sort_year_keys};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearState {
    Unloaded,
    Loading,
    Loaded,
}

impl fmt::Display for YearState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            YearState::Unloaded => "unloaded",
            YearState::Loading => "loading",
            YearState::Loaded => "loaded",
        };
        f.write_str(s)
    }
}

enum YearSlot {
    Loading,
    Loaded(YearData),
}

#[derive(Default)]
struct Cache {
    dimensions: Vec<Dimension>,
    years: HashMap<String, YearSlot>,
    /// Backend keys plus loaded years, most recent first.
    known_years: Vec<String>,
}

impl Cache {
    fn loaded(&self, year: &str) -> Option<&YearData> {
        match self.years.get(year) {
            Some(YearSlot::Loaded(data)) => Some(data),
            _ => None,
        }
    }

    fn loaded_mut(&mut self, year: &str) -> StoreResult<&mut YearData> {
        match self.years.get_mut(year) {
            Some(YearSlot::Loaded(data)) => Ok(data),
            Some(YearSlot::Loading) => Err(StoreError::InvalidState {
                year: year.to_string(),
                state: YearState::Loading,
            }),
            None => Err(StoreError::InvalidState {
                year: year.to_string(),
                state: YearState::Unloaded,
            }),
        }
    }

    fn remember_year(&mut self, year: &str) {
        if !self.known_years.iter().any(|y| y == year) {
            self.known_years.push(year.to_string());
            sort_year_keys(&mut self.known_years);
        }
    }
}

pub struct PerformanceStore<B: StorageBackend> {
    backend: Arc<B>,
    config: StoreConfig,
    cache: RwLock<Cache>,
    writer: Mutex<()>,
}

impl<B: StorageBackend> PerformanceStore<B> {
    /// Load the dimension registry (seeding defaults into an empty backend)
    /// and the list of stored years. No year is loaded yet.
    pub async fn open(backend: Arc<B>, config: StoreConfig) -> StoreResult<Self> {
        let stored = backend
            .fetch_dimensions()
            .await
            .map_err(|e| StoreError::persistence("fetch dimensions", e))?;
        let dimensions = match stored {
            Some(dims) if !dims.is_empty() => dims,
            _ => {
                let dims = default_dimensions();
                backend
                    .save_dimensions(&dims)
                    .await
                    .map_err(|e| StoreError::persistence("seed dimensions", e))?;
                info!(count = dims.len(), "seeded default dimensions");
                dims
            }
        };

        let known_years = backend
            .fetch_all_year_keys()
            .await
            .map_err(|e| StoreError::persistence("list years", e))?;
        debug!(years = ?known_years, dimensions = dimensions.len(), "store opened");

        Ok(Self {
            backend,
            config,
            cache: RwLock::new(Cache {
                dimensions,
                years: HashMap::new(),
                known_years,
            }),
            writer: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, Cache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, Cache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ----- lifecycle -----

    /// Fetch `year` from the backend. A year with no stored document is
    /// materialized empty; it is written on its first mutation. On fetch
    /// failure the year returns to `Unloaded`.
    pub async fn load_year(&self, year: &str) -> StoreResult<YearData> {
        validate_year_key(year)?;
        let _writer = self.writer.lock().await;

        {
            let mut cache = self.write_cache();
            if let Some(data) = cache.loaded(year) {
                return Ok(data.clone());
            }
            cache.years.insert(year.to_string(), YearSlot::Loading);
        }

        let stored = match self.backend.fetch_year(year).await {
            Ok(stored) => stored,
            Err(e) => {
                self.write_cache().years.remove(year);
                warn!(year, error = %e, "year load failed");
                return Err(StoreError::persistence("fetch year", e));
            }
        };

        // Documents written before the registry file existed carry their own
        // dimension configs; adopt any ids the registry lacks.
        let merged = {
            let mut cache = self.write_cache();
            let incoming = stored.as_ref().map(|d| d.dimension_configs.as_slice()).unwrap_or(&[]);
            let added = merge_missing(&mut cache.dimensions, incoming);
            (!added.is_empty()).then(|| (cache.dimensions.clone(), added))
        };
        if let Some((registry, added)) = merged {
            if let Err(e) = self.backend.save_dimensions(&registry).await {
                let mut cache = self.write_cache();
                cache.dimensions.retain(|d| !added.contains(&d.id));
                cache.years.remove(year);
                warn!(year, error = %e, "dimension merge failed");
                return Err(StoreError::persistence("merge dimensions", e));
            }
            info!(year, added = ?added, "adopted dimensions from year document");
        }

        let mut cache = self.write_cache();
        let existed = stored.is_some();
        let mut data = stored.unwrap_or_else(|| YearData::empty(year));
        data.year = year.to_string();
        data.ensure_dimensions(cache.dimensions.iter().map(|d| d.id.as_str()));
        let mut data = normalize_year_data_with(data, self.config.aggregation);
        data.dimension_configs = cache.dimensions.clone();

        cache
            .years
            .insert(year.to_string(), YearSlot::Loaded(data.clone()));
        cache.remember_year(year);
        info!(year, existed, dimensions = data.dimensions.len(), "year loaded");
        Ok(data)
    }

    pub fn year_state(&self, year: &str) -> YearState {
        match self.read_cache().years.get(year) {
            None => YearState::Unloaded,
            Some(YearSlot::Loading) => YearState::Loading,
            Some(YearSlot::Loaded(_)) => YearState::Loaded,
        }
    }

    /// Re-read the stored year keys. Loaded years stay listed.
    pub async fn refresh_years(&self) -> StoreResult<Vec<String>> {
        let keys = self
            .backend
            .fetch_all_year_keys()
            .await
            .map_err(|e| StoreError::persistence("list years", e))?;
        let mut cache = self.write_cache();
        let mut merged = keys;
        merged.extend(
            cache
                .years
                .iter()
                .filter(|(_, slot)| matches!(slot, YearSlot::Loaded(_)))
                .map(|(k, _)| k.clone()),
        );
        sort_year_keys(&mut merged);
        cache.known_years = merged.clone();
        Ok(merged)
    }

    /// Delete a year document from the backend and drop it from the cache.
    pub async fn delete_year(&self, year: &str) -> StoreResult<()> {
        validate_year_key(year)?;
        let _writer = self.writer.lock().await;
        self.backend
            .delete_year(year)
            .await
            .map_err(|e| StoreError::persistence("delete year", e))?;

        let mut cache = self.write_cache();
        cache.years.remove(year);
        cache.known_years.retain(|y| y != year);
        info!(year, "year deleted");
        Ok(())
    }

    /// Delete every stored year. The dimension registry is kept.
    pub async fn reset_all_data(&self) -> StoreResult<()> {
        let _writer = self.writer.lock().await;
        let keys = self
            .backend
            .fetch_all_year_keys()
            .await
            .map_err(|e| StoreError::persistence("list years", e))?;

        for year in &keys {
            let deleted = self.backend.delete_year(year).await;
            let mut cache = self.write_cache();
            match deleted {
                Ok(()) => {
                    cache.years.remove(year);
                    cache.known_years.retain(|y| y != year);
                }
                Err(e) => {
                    warn!(year = %year, error = %e, "reset stopped");
                    return Err(StoreError::persistence("reset", e));
                }
            }
        }

        let mut cache = self.write_cache();
        cache.years.clear();
        cache.known_years.clear();
        info!(deleted = keys.len(), "all year data reset");
        Ok(())
    }

    // ----- reads -----

    /// Cached document for a loaded year.
    pub fn current_year_data(&self, year: &str) -> Option<YearData> {
        self.read_cache().loaded(year).cloned()
    }

    pub fn dimension_data(&self, year: &str, dimension_id: &str) -> Option<DimensionYearData> {
        self.read_cache()
            .loaded(year)
            .and_then(|y| y.dimensions.get(dimension_id))
            .cloned()
    }

    pub fn get_task(&self, year: &str, dimension_id: &str, month: usize, task_id: &str) -> Option<Task> {
        self.read_cache()
            .loaded(year)
            .and_then(|y| y.dimensions.get(dimension_id))
            .and_then(|d| d.find_task(month, task_id))
            .cloned()
    }

    pub fn month_summaries(&self, year: &str, dimension_id: &str) -> Option<Vec<MonthSummary>> {
        self.read_cache()
            .loaded(year)
            .and_then(|y| y.dimensions.get(dimension_id))
            .map(DimensionYearData::month_summaries)
    }

    /// Known year keys, most recent first.
    pub fn available_years(&self) -> Vec<String> {
        self.read_cache().known_years.clone()
    }

    /// Registered dimension, or the "unknown dimension" placeholder.
    pub fn dimension_config(&self, id: &str) -> Dimension {
        self.read_cache()
            .dimensions
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .unwrap_or_else(|| Dimension::unknown(id))
    }

    pub fn all_dimension_configs(&self) -> Vec<Dimension> {
        self.read_cache().dimensions.clone()
    }

    /// Month index 0-11 of the wall clock in the configured timezone.
    pub fn current_month(&self) -> usize {
        manifest_core::current_month(self.config.timezone)
    }

    // ----- dimension registry -----

    /// Register a dimension and give every loaded year an empty entry for it.
    pub async fn add_dimension(&self, def: NewDimension) -> StoreResult<String> {
        let title = def.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::new("title", "must not be empty").into());
        }

        let _writer = self.writer.lock().await;
        let (registry, id) = {
            let mut cache = self.write_cache();
            if title_taken(&cache.dimensions, &title, None) {
                return Err(StoreError::DuplicateTitle { title });
            }
            let id = dimension_id_for(&title, &cache.dimensions);
            cache.dimensions.push(Dimension {
                id: id.clone(),
                title: title.clone(),
                icon: def.icon,
                color: def.color,
                is_default: def.is_default,
            });
            for slot in cache.years.values_mut() {
                if let YearSlot::Loaded(data) = slot {
                    data.ensure_dimensions([id.as_str()]);
                }
            }
            (cache.dimensions.clone(), id)
        };

        if let Err(e) = self.backend.save_dimensions(&registry).await {
            warn!(dimension = %id, error = %e, "dimension persist failed; rolling back");
            let mut cache = self.write_cache();
            cache.dimensions.retain(|d| d.id != id);
            for slot in cache.years.values_mut() {
                if let YearSlot::Loaded(data) = slot {
                    data.dimensions.remove(&id);
                }
            }
            return Err(StoreError::persistence("add dimension", e));
        }

        info!(dimension = %id, title = %title, "dimension added");
        Ok(id)
    }

    /// Edit a dimension's title, icon or color.
    pub async fn update_dimension(&self, id: &str, patch: DimensionPatch) -> StoreResult<Dimension> {
        let _writer = self.writer.lock().await;
        let (registry, previous, updated) = {
            let mut cache = self.write_cache();
            let Some(pos) = cache.dimensions.iter().position(|d| d.id == id) else {
                return Err(StoreError::UnknownDimension { id: id.to_string() });
            };
            let mut updated = cache.dimensions[pos].clone();
            if let Some(title) = patch.title {
                let title = title.trim().to_string();
                if title.is_empty() {
                    return Err(ValidationError::new("title", "must not be empty").into());
                }
                if title_taken(&cache.dimensions, &title, Some(id)) {
                    return Err(StoreError::DuplicateTitle { title });
                }
                updated.title = title;
            }
            if let Some(icon) = patch.icon {
                updated.icon = icon;
            }
            if let Some(color) = patch.color {
                updated.color = color;
            }
            let previous = std::mem::replace(&mut cache.dimensions[pos], updated.clone());
            (cache.dimensions.clone(), previous, updated)
        };

        if let Err(e) = self.backend.save_dimensions(&registry).await {
            warn!(dimension = id, error = %e, "dimension persist failed; rolling back");
            let mut cache = self.write_cache();
            if let Some(slot) = cache.dimensions.iter_mut().find(|d| d.id == id) {
                *slot = previous;
            }
            return Err(StoreError::persistence("update dimension", e));
        }
        Ok(updated)
    }

    // ----- year mutations -----

    pub async fn update_dimension_annual_goal(
        &self,
        year: &str,
        dimension_id: &str,
        text: impl Into<String>,
    ) -> StoreResult<()> {
        let text = text.into();
        self.mutate_year("update annual goal", year, move |data, _| {
            dimension_mut(data, dimension_id)?.annual_goal = text;
            Ok(())
        })
        .await
    }

    pub async fn update_dimension_quarterly_goal(
        &self,
        year: &str,
        dimension_id: &str,
        quarter: usize,
        text: impl Into<String>,
    ) -> StoreResult<()> {
        let text = text.into();
        self.mutate_year("update quarterly goal", year, move |data, _| {
            check_index("quarter", quarter, QUARTERS)?;
            let dim = dimension_mut(data, dimension_id)?;
            dim.quarterly_goals[quarter] = text;
            Ok(())
        })
        .await
    }

    /// Validate `input`, give it a fresh id, and append it to the month.
    pub async fn add_monthly_task(
        &self,
        year: &str,
        dimension_id: &str,
        month: usize,
        input: TaskInput,
    ) -> StoreResult<Task> {
        self.mutate_year("add task", year, move |data, aggregation| {
            check_index("month", month, MONTHS)?;
            if !data.dimensions.contains_key(dimension_id) {
                return Err(unknown_dimension(dimension_id));
            }
            let task = validate_task(data.fresh_task_id(), &input)?;
            dimension_mut(data, dimension_id)?.monthly_tasks[month].push(task.clone());
            data.recompute_dimension(dimension_id, aggregation);
            Ok(task)
        })
        .await
    }

    /// Merge `patch` into the task and re-validate it as a whole.
    pub async fn update_monthly_task(
        &self,
        year: &str,
        dimension_id: &str,
        month: usize,
        task_id: &str,
        patch: TaskPatch,
    ) -> StoreResult<Task> {
        self.mutate_year("update task", year, move |data, aggregation| {
            check_index("month", month, MONTHS)?;
            let tasks = &mut dimension_mut(data, dimension_id)?.monthly_tasks[month];
            let slot = tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or_else(|| task_not_found(task_id, month))?;
            let updated = apply_patch(slot, &patch)?;
            *slot = updated.clone();
            data.recompute_dimension(dimension_id, aggregation);
            Ok(updated)
        })
        .await
    }

    pub async fn delete_monthly_task(
        &self,
        year: &str,
        dimension_id: &str,
        month: usize,
        task_id: &str,
    ) -> StoreResult<()> {
        self.mutate_year("delete task", year, move |data, aggregation| {
            check_index("month", month, MONTHS)?;
            let tasks = &mut dimension_mut(data, dimension_id)?.monthly_tasks[month];
            let pos = tasks
                .iter()
                .position(|t| t.id == task_id)
                .ok_or_else(|| task_not_found(task_id, month))?;
            tasks.remove(pos);
            data.recompute_dimension(dimension_id, aggregation);
            Ok(())
        })
        .await
    }

    /// Override the status -> score mapping for one dimension in one year.
    pub async fn update_dimension_scoring(
        &self,
        year: &str,
        dimension_id: &str,
        scoring: ScoringSettings,
    ) -> StoreResult<()> {
        check_scoring(&scoring)?;
        self.mutate_year("update scoring", year, move |data, aggregation| {
            dimension_mut(data, dimension_id)?.settings.scoring = scoring;
            data.recompute_dimension(dimension_id, aggregation);
            Ok(())
        })
        .await
    }

    /// Set the per-dimension weights used for the year's total score.
    pub async fn update_year_weights(
        &self,
        year: &str,
        weights: BTreeMap<String, f64>,
    ) -> StoreResult<()> {
        if let Some((id, w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(ValidationError::new(
                "dimensionWeights",
                format!("weight for '{id}' must be a non-negative number, got {w}"),
            )
            .into());
        }
        self.mutate_year("update weights", year, move |data, _| {
            data.settings.scoring.dimension_weights = weights;
            data.recompute_total();
            Ok(())
        })
        .await
    }

    /// Run one mutation against a loaded year: apply `f` to the cached
    /// document, persist, and restore the snapshot if either step fails.
    async fn mutate_year<T, F>(&self, op: &'static str, year: &str, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut YearData, manifest_core::ScoreAggregation) -> StoreResult<T> + Send,
        T: Send,
    {
        // Fail fast while the year is not loaded rather than queueing.
        if self.year_state(year) != YearState::Loaded {
            return Err(StoreError::InvalidState {
                year: year.to_string(),
                state: self.year_state(year),
            });
        }

        let _writer = self.writer.lock().await;
        let (snapshot, updated, out) = {
            let mut cache = self.write_cache();
            let registry = cache.dimensions.clone();
            let data = cache.loaded_mut(year)?;
            let snapshot = data.clone();
            match f(data, self.config.aggregation) {
                Ok(out) => {
                    data.dimension_configs = registry;
                    (snapshot, data.clone(), out)
                }
                Err(e) => {
                    *data = snapshot;
                    return Err(e);
                }
            }
        };

        debug!(op, year, "persisting");
        if let Err(e) = self.backend.save_year(year, &updated).await {
            warn!(op, year, error = %e, "persist failed; rolling back");
            let mut cache = self.write_cache();
            if let Some(slot) = cache.years.get_mut(year) {
                *slot = YearSlot::Loaded(snapshot);
            }
            return Err(StoreError::persistence(op, e));
        }

        self.write_cache().remember_year(year);
        Ok(out)
    }
}

fn unknown_dimension(id: &str) -> StoreError {
    StoreError::UnknownDimension { id: id.to_string() }
}

fn task_not_found(task_id: &str, month: usize) -> StoreError {
    StoreError::TaskNotFound {
        task_id: task_id.to_string(),
        month,
    }
}

fn dimension_mut<'a>(data: &'a mut YearData, id: &str) -> StoreResult<&'a mut DimensionYearData> {
    data.dimensions
        .get_mut(id)
        .ok_or_else(|| unknown_dimension(id))
}

fn check_index(what: &'static str, index: usize, len: usize) -> StoreResult<()> {
    if index < len {
        Ok(())
    } else {
        Err(StoreError::IndexOutOfRange { what, index, len })
    }
}

fn check_scoring(scoring: &ScoringSettings) -> StoreResult<()> {
    let fields = [
        ("completedScore", scoring.completed_score),
        ("inProgressScore", scoring.in_progress_score),
        ("notStartedScore", scoring.not_started_score),
    ];
    for (field, value) in fields {
        if !value.is_finite() {
            return Err(ValidationError::new(field, format!("{value} is not a number")).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryBackend;

    async fn store() -> PerformanceStore<InMemoryBackend> {
        PerformanceStore::open(Arc::new(InMemoryBackend::new()), StoreConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn open_seeds_default_dimensions() {
        let s = store().await;
        let dims = s.all_dimension_configs();
        assert_eq!(dims.len(), default_dimensions().len());
        assert!(dims.iter().all(|d| d.is_default));
        assert!(s.backend().stored_dimensions().await.is_some());
    }

    #[tokio::test]
    async fn unknown_dimension_config_falls_back() {
        let s = store().await;
        let d = s.dimension_config("nope");
        assert_eq!(d.title, manifest_core::dimension::UNKNOWN_DIMENSION_TITLE);
        assert_eq!(d.color, manifest_core::dimension::FALLBACK_COLOR);
    }

    #[tokio::test]
    async fn mutation_before_load_is_invalid_state() {
        let s = store().await;
        let err = s
            .update_dimension_annual_goal("2025", "health", "Run a marathon")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidState {
                year: "2025".into(),
                state: YearState::Unloaded
            }
        );
    }

    #[tokio::test]
    async fn quarter_out_of_range_leaves_goals_untouched() {
        let s = store().await;
        s.load_year("2025").await.unwrap();
        s.update_dimension_quarterly_goal("2025", "health", 1, "Q2 plan")
            .await
            .unwrap();

        let err = s
            .update_dimension_quarterly_goal("2025", "health", 4, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfRange { what: "quarter", index: 4, .. }));

        let dim = s.dimension_data("2025", "health").unwrap();
        assert_eq!(dim.quarterly_goals, vec!["", "Q2 plan", "", ""]);
    }

    #[tokio::test]
    async fn unknown_dimension_on_goal_update() {
        let s = store().await;
        s.load_year("2025").await.unwrap();
        let err = s
            .update_dimension_annual_goal("2025", "hobbies", "x")
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::UnknownDimension { id: "hobbies".into() });
    }
}
