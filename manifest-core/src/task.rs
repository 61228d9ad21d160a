//! Task model for monthly action items.
//!
//! A task lives in exactly one (year, dimension, month) bucket. Its placement is
//! fixed at creation; only its fields change afterwards.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Highest self-rated score a task may carry.
pub const MAX_SCORE: u8 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not-started",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "not-started" => Ok(TaskStatus::NotStarted),
            "in-progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// A validated task as held in a year document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub status: TaskStatus,
    /// 0-100, self-rated. Older documents may hold floats; they are rounded on load.
    #[serde(default, deserialize_with = "deserialize_score")]
    pub score: u8,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub priority: Priority,
    /// Stored dates that are blank or not `YYYY-MM-DD` load as `None`.
    #[serde(default, deserialize_with = "deserialize_date", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_date", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: TaskStatus::NotStarted,
            score: 0,
            priority: Priority::Medium,
            start_date: None,
            end_date: None,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_score(mut self, score: u8) -> Self {
        self.score = score.min(MAX_SCORE);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Fields accepted when creating a task. Status and priority arrive as raw
/// strings so that unknown values can be reported by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskInput {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub score: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl TaskInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn score(mut self, score: i64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn dates(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = Some(start.into());
        self.end_date = Some(end.into());
        self
    }
}

/// Partial update for an existing task. `None` leaves the field untouched;
/// an empty description or date string clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub score: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl TaskPatch {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    pub fn score(score: i64) -> Self {
        Self {
            score: Some(score),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Fresh task id.
pub fn new_task_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Round and clamp a stored score into [0, 100].
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, MAX_SCORE as f64) as u8
}

fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.map(clamp_score).unwrap_or(0))
}

/// Parse a stored enum string, falling back to the default for blank or
/// unknown values.
fn deserialize_lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = String> + Default,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(raw.parse().unwrap_or_else(|e: String| {
        warn!(error = %e, "unreadable stored value, using default");
        T::default()
    }))
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Ok(Some(date)),
        Err(_) => {
            warn!(date = raw, "dropping unreadable stored date");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_kebab_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        assert_eq!("not-started".parse::<TaskStatus>().unwrap(), TaskStatus::NotStarted);
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn float_scores_from_older_documents_are_rounded_and_clamped() {
        let t: Task = serde_json::from_str(
            r#"{"id":"a","title":"Run","status":"completed","score":87.6,"priority":"high"}"#,
        )
        .unwrap();
        assert_eq!(t.score, 88);

        let t: Task = serde_json::from_str(r#"{"id":"b","title":"Run","score":140}"#).unwrap();
        assert_eq!(t.score, 100);
        assert_eq!(t.status, TaskStatus::NotStarted);
        assert_eq!(t.priority, Priority::Medium);
    }

    #[test]
    fn camel_case_dates_are_optional() {
        let t = Task::new("x", "Plan trip");
        let json = serde_json::to_string(&t).unwrap();
        assert!(!json.contains("startDate"));

        let t: Task = serde_json::from_str(
            r#"{"id":"c","title":"Trip","startDate":"2025-03-01","endDate":"2025-03-09"}"#,
        )
        .unwrap();
        assert_eq!(t.start_date, NaiveDate::from_ymd_opt(2025, 3, 1));
    }

    #[test]
    fn blank_or_garbled_stored_fields_fall_back() {
        let t: Task = serde_json::from_str(
            r#"{"id":"d","title":"Swim","description":"","status":"","priority":"urgent",
                "startDate":"","endDate":"next week"}"#,
        )
        .unwrap();
        assert_eq!(t.status, TaskStatus::NotStarted);
        assert_eq!(t.priority, Priority::Medium);
        assert_eq!(t.start_date, None);
        assert_eq!(t.end_date, None);

        let t: Task =
            serde_json::from_str(r#"{"id":"e","title":"Swim","status":null,"startDate":null}"#)
                .unwrap();
        assert_eq!(t.status, TaskStatus::NotStarted);
        assert_eq!(t.start_date, None);
    }
}
