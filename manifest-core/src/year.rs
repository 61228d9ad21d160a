//! Year documents and aggregate recomputation.
//!
//! Aggregates (`totalTasks`, `completedTasks`, `totalScore`, `progress`) are
//! stored alongside the tasks for readers, but they are a cache: every load
//! goes through [`normalize_year_data`] and every mutation through
//! [`DimensionYearData::recompute`].

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

use crate::dimension::Dimension;
use crate::scoring::{ScoreAggregation, ScoringSettings, round2};
use crate::task::{Task, new_task_id};

pub const QUARTERS: usize = 4;
pub const MONTHS: usize = 12;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DimensionSettings {
    pub scoring: ScoringSettings,
}

/// One dimension's goals and tasks for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DimensionYearData {
    #[serde(deserialize_with = "null_as_default")]
    pub annual_goal: String,
    #[serde(deserialize_with = "null_as_default")]
    pub quarterly_goals: Vec<String>,
    /// Index 0 is January.
    #[serde(deserialize_with = "deserialize_months")]
    pub monthly_tasks: Vec<Vec<Task>>,
    pub total_score: f64,
    pub completed_tasks: usize,
    pub total_tasks: usize,
    /// 0-100.
    pub progress: u8,
    #[serde(deserialize_with = "null_as_default")]
    pub settings: DimensionSettings,
}

impl Default for DimensionYearData {
    fn default() -> Self {
        Self {
            annual_goal: String::new(),
            quarterly_goals: vec![String::new(); QUARTERS],
            monthly_tasks: vec![Vec::new(); MONTHS],
            total_score: 0.0,
            completed_tasks: 0,
            total_tasks: 0,
            progress: 0,
            settings: DimensionSettings::default(),
        }
    }
}

/// Per-month counts for the analytics trend view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub month: usize,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub progress: u8,
}

/// round(completed / total * 100), 0 when there are no tasks.
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((completed * 100 + total / 2) / total) as u8
}

impl DimensionYearData {
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.monthly_tasks.iter().flatten()
    }

    pub fn find_task(&self, month: usize, task_id: &str) -> Option<&Task> {
        self.monthly_tasks
            .get(month)
            .and_then(|tasks| tasks.iter().find(|t| t.id == task_id))
    }

    /// Recompute every aggregate from the current task set.
    pub fn recompute(&mut self, aggregation: ScoreAggregation) {
        let scoring = &self.settings.scoring;
        let mut total = 0;
        let mut completed = 0;
        let mut contributions = Vec::new();
        for task in self.monthly_tasks.iter().flatten() {
            total += 1;
            if task.is_completed() {
                completed += 1;
            }
            contributions.push(scoring.contribution(task.status));
        }
        self.total_tasks = total;
        self.completed_tasks = completed;
        self.progress = progress_percent(completed, total);
        self.total_score = aggregation.fold(&contributions);
    }

    pub fn month_summary(&self, month: usize) -> MonthSummary {
        let tasks = self.monthly_tasks.get(month).map(Vec::as_slice).unwrap_or(&[]);
        let completed = tasks.iter().filter(|t| t.is_completed()).count();
        MonthSummary {
            month,
            total_tasks: tasks.len(),
            completed_tasks: completed,
            progress: progress_percent(completed, tasks.len()),
        }
    }

    pub fn month_summaries(&self) -> Vec<MonthSummary> {
        (0..MONTHS).map(|m| self.month_summary(m)).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YearSettings {
    pub scoring: ScoringSettings,
}

/// All tracked state for one calendar year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YearData {
    pub year: String,
    /// Weighted mean of dimension scores; see [`YearData::recompute_total`].
    pub total_score: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub settings: YearSettings,
    /// Copy of the dimension registry carried in each document for readers
    /// that predate `dimensions.json`.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub dimension_configs: Vec<Dimension>,
    #[serde(deserialize_with = "null_as_default")]
    pub dimensions: BTreeMap<String, DimensionYearData>,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Month slots, each of which may be `null` in older documents.
fn deserialize_months<'de, D>(deserializer: D) -> Result<Vec<Vec<Task>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Option<Vec<Task>>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw.into_iter().map(Option::unwrap_or_default).collect())
}

impl YearData {
    pub fn empty(year: impl Into<String>) -> Self {
        Self {
            year: year.into(),
            ..Self::default()
        }
    }

    /// Make sure every id in `dimension_ids` has a (possibly empty) entry.
    /// Returns true if anything was added.
    pub fn ensure_dimensions<'a>(&mut self, dimension_ids: impl IntoIterator<Item = &'a str>) -> bool {
        let mut added = false;
        for id in dimension_ids {
            if !self.dimensions.contains_key(id) {
                self.dimensions
                    .insert(id.to_string(), DimensionYearData::default());
                added = true;
            }
        }
        added
    }

    pub fn contains_task_id(&self, task_id: &str) -> bool {
        self.dimensions
            .values()
            .flat_map(|d| d.tasks())
            .any(|t| t.id == task_id)
    }

    /// A task id not used anywhere in this document.
    pub fn fresh_task_id(&self) -> String {
        loop {
            let id = new_task_id();
            if !self.contains_task_id(&id) {
                return id;
            }
        }
    }

    /// Weighted mean of dimension `totalScore`s over dimensions that have at
    /// least one task and a positive weight.
    pub fn recompute_total(&mut self) {
        let scoring = &self.settings.scoring;
        let mut weighted = 0.0;
        let mut weights = 0.0;
        for (id, dim) in &self.dimensions {
            let w = scoring.weight_for(id);
            if dim.total_tasks == 0 || w <= 0.0 {
                continue;
            }
            weighted += dim.total_score * w;
            weights += w;
        }
        self.total_score = if weights > 0.0 {
            round2(weighted / weights)
        } else {
            0.0
        };
    }

    /// Recompute one dimension and the year total.
    pub fn recompute_dimension(&mut self, dimension_id: &str, aggregation: ScoreAggregation) {
        if let Some(dim) = self.dimensions.get_mut(dimension_id) {
            dim.recompute(aggregation);
        }
        self.recompute_total();
    }

    pub fn recompute_all(&mut self, aggregation: ScoreAggregation) {
        for dim in self.dimensions.values_mut() {
            dim.recompute(aggregation);
        }
        self.recompute_total();
    }
}

/// Normalize with the default (average) score aggregation.
pub fn normalize_year_data(raw: YearData) -> YearData {
    normalize_year_data_with(raw, ScoreAggregation::default())
}

/// Repair a possibly partial stored document: exactly 4 quarter and 12 month
/// slots per dimension, unique non-empty task ids, sane scoring settings, and
/// every aggregate recomputed from the tasks. Idempotent.
pub fn normalize_year_data_with(mut raw: YearData, aggregation: ScoreAggregation) -> YearData {
    let year = raw.year.clone();
    let mut seen: HashSet<String> = HashSet::new();
    let mut reassigned = Vec::new();

    raw.settings.scoring = std::mem::take(&mut raw.settings.scoring).sanitized();
    raw.dimension_configs.retain(|d| !d.id.trim().is_empty());

    for (dim_id, dim) in raw.dimensions.iter_mut() {
        if dim.quarterly_goals.len() > QUARTERS {
            warn!(year = %year, dimension = %dim_id, slots = dim.quarterly_goals.len(), "dropping extra quarterly goal slots");
        }
        dim.quarterly_goals.resize(QUARTERS, String::new());

        if dim.monthly_tasks.len() > MONTHS {
            let dropped: usize = dim.monthly_tasks[MONTHS..].iter().map(Vec::len).sum();
            warn!(year = %year, dimension = %dim_id, dropped, "dropping tasks stored past December");
        }
        dim.monthly_tasks.resize_with(MONTHS, Vec::new);

        dim.settings.scoring = std::mem::take(&mut dim.settings.scoring).sanitized();

        for task in dim.monthly_tasks.iter_mut().flatten() {
            if task.description.as_deref().is_some_and(|d| d.trim().is_empty()) {
                task.description = None;
            }
            if task.id.is_empty() || !seen.insert(task.id.clone()) {
                reassigned.push(task);
            }
        }
    }

    if !reassigned.is_empty() {
        warn!(year = %year, count = reassigned.len(), "reassigning missing or duplicate task ids");
    }
    for task in reassigned {
        let id = loop {
            let id = new_task_id();
            if seen.insert(id.clone()) {
                break id;
            }
        };
        task.id = id;
    }

    raw.recompute_all(aggregation);
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;

    fn health_march(tasks: Vec<Task>) -> YearData {
        let mut year = YearData::empty("2025");
        let mut dim = DimensionYearData::default();
        dim.monthly_tasks[2] = tasks;
        year.dimensions.insert("health".into(), dim);
        year
    }

    #[test]
    fn progress_rounding() {
        assert_eq!(progress_percent(0, 0), 0);
        assert_eq!(progress_percent(1, 2), 50);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(3, 3), 100);
    }

    #[test]
    fn two_task_march_scenario() {
        let mut year = health_march(vec![
            Task::new("a", "Run").with_status(TaskStatus::Completed).with_score(100),
            Task::new("b", "Swim"),
        ]);
        year.recompute_all(ScoreAggregation::Average);
        let dim = &year.dimensions["health"];
        assert_eq!(dim.total_tasks, 2);
        assert_eq!(dim.completed_tasks, 1);
        assert_eq!(dim.progress, 50);
        assert_eq!(dim.total_score, 50.0);
        assert_eq!(year.total_score, 50.0);
    }

    #[test]
    fn normalize_pads_slots_and_ignores_stored_aggregates() {
        let raw: YearData = serde_json::from_str(
            r#"{
                "year": "2024",
                "dimensions": {
                    "career": {
                        "annualGoal": "Ship v2",
                        "quarterlyGoals": ["Q1"],
                        "monthlyTasks": [[{"id":"t1","title":"Draft","status":"completed","score":90}]],
                        "totalTasks": 40,
                        "completedTasks": 39,
                        "progress": 98
                    }
                }
            }"#,
        )
        .unwrap();
        let year = normalize_year_data(raw);
        let dim = &year.dimensions["career"];
        assert_eq!(dim.quarterly_goals, vec!["Q1", "", "", ""]);
        assert_eq!(dim.monthly_tasks.len(), MONTHS);
        assert_eq!(dim.total_tasks, 1);
        assert_eq!(dim.completed_tasks, 1);
        assert_eq!(dim.progress, 100);
        assert_eq!(dim.settings.scoring, ScoringSettings::default());
    }

    #[test]
    fn normalize_repairs_duplicate_and_empty_ids() {
        let mut year = health_march(vec![Task::new("dup", "A"), Task::new("", "B")]);
        year.dimensions.get_mut("health").unwrap().monthly_tasks[5] = vec![Task::new("dup", "C")];
        let year = normalize_year_data(year);

        let ids: Vec<&str> = year.dimensions["health"].tasks().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], "dup");
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 3);
        assert!(ids.iter().all(|id| !id.is_empty()));
    }

    #[test]
    fn normalize_truncates_overlong_documents() {
        let mut year = health_march(vec![]);
        let dim = year.dimensions.get_mut("health").unwrap();
        dim.quarterly_goals = vec!["a".into(); 6];
        dim.monthly_tasks = vec![Vec::new(); 13];
        dim.monthly_tasks[12] = vec![Task::new("late", "Overflow")];

        let year = normalize_year_data(year);
        let dim = &year.dimensions["health"];
        assert_eq!(dim.quarterly_goals.len(), QUARTERS);
        assert_eq!(dim.monthly_tasks.len(), MONTHS);
        assert_eq!(dim.total_tasks, 0);
    }

    #[test]
    fn null_slots_from_older_writers_load_as_empty() {
        let raw: YearData = serde_json::from_str(
            r#"{"year":"2024","settings":null,"dimensionConfigs":null,"dimensions":{
                "health":{"annualGoal":null,"quarterlyGoals":null,"settings":null,
                  "monthlyTasks":[null,[{"id":"t1","title":"Run","status":"completed","score":90}]]},
                "career":{"monthlyTasks":null}}}"#,
        )
        .unwrap();
        let year = normalize_year_data(raw);

        let health = &year.dimensions["health"];
        assert_eq!(health.quarterly_goals, vec![""; QUARTERS]);
        assert_eq!(health.monthly_tasks.len(), MONTHS);
        assert!(health.monthly_tasks[0].is_empty());
        assert_eq!(health.monthly_tasks[1][0].id, "t1");
        assert_eq!(health.completed_tasks, 1);
        assert_eq!(health.progress, 100);
        assert_eq!(year.dimensions["career"].monthly_tasks.len(), MONTHS);

        let empty: YearData = serde_json::from_str(r#"{"year":"2023","dimensions":null}"#).unwrap();
        assert!(empty.dimensions.is_empty());
    }

    #[test]
    fn dimension_configs_are_read_and_kept() {
        let raw: YearData = serde_json::from_str(
            r##"{"year":"2024","dimensionConfigs":[
                {"key":"reading","title":"Reading","icon":"Book","color":"#123456","isDefault":false},
                {"key":"","title":"Blank"}]}"##,
        )
        .unwrap();
        let year = normalize_year_data(raw);
        assert_eq!(year.dimension_configs.len(), 1);
        assert_eq!(year.dimension_configs[0].id, "reading");

        let json = serde_json::to_string(&year).unwrap();
        assert!(json.contains("dimensionConfigs"));
        assert!(!serde_json::to_string(&YearData::empty("2025")).unwrap().contains("dimensionConfigs"));
    }

    #[test]
    fn year_total_uses_dimension_weights() {
        let mut year = health_march(vec![Task::new("a", "Run").with_status(TaskStatus::Completed)]);
        let mut career = DimensionYearData::default();
        career.monthly_tasks[0] = vec![Task::new("b", "Apply")];
        year.dimensions.insert("career".into(), career);
        year.dimensions.insert("family".into(), DimensionYearData::default());

        year.recompute_all(ScoreAggregation::Average);
        assert_eq!(year.total_score, 50.0);

        year.settings.scoring.dimension_weights.insert("health".into(), 3.0);
        year.recompute_total();
        assert_eq!(year.total_score, 75.0);
    }

    #[test]
    fn month_summaries_cover_every_month() {
        let year = normalize_year_data(health_march(vec![
            Task::new("a", "Run").with_status(TaskStatus::Completed),
            Task::new("b", "Swim"),
            Task::new("c", "Bike"),
        ]));
        let months = year.dimensions["health"].month_summaries();
        assert_eq!(months.len(), MONTHS);
        assert_eq!(months[2].total_tasks, 3);
        assert_eq!(months[2].progress, 33);
        assert_eq!(months[0].progress, 0);
    }
}
