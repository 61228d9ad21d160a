//! Task validation.
//!
//! Creation and partial updates go through the same path: a patch is merged
//! into a `TaskInput` built from the current task and the result is validated
//! as a whole. Nothing is applied unless every field passes.

use chrono::NaiveDate;
use thiserror::Error;

use crate::task::{MAX_SCORE, Priority, Task, TaskInput, TaskPatch, TaskStatus};

/// Malformed task input, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Validate creation input and build a task carrying `id`.
pub fn validate_task(id: impl Into<String>, input: &TaskInput) -> Result<Task, ValidationError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ValidationError::new("title", "must not be empty"));
    }

    let status = match input.status.as_deref() {
        None => TaskStatus::default(),
        Some(s) => s
            .parse::<TaskStatus>()
            .map_err(|e| ValidationError::new("status", e))?,
    };

    let priority = match input.priority.as_deref() {
        None => Priority::default(),
        Some(s) => s
            .parse::<Priority>()
            .map_err(|e| ValidationError::new("priority", e))?,
    };

    let score = match input.score {
        None => 0,
        Some(s) if (0..=MAX_SCORE as i64).contains(&s) => s as u8,
        Some(s) => {
            return Err(ValidationError::new(
                "score",
                format!("{s} is outside 0..={MAX_SCORE}"),
            ));
        }
    };

    let start_date = parse_date("startDate", input.start_date.as_deref())?;
    let end_date = parse_date("endDate", input.end_date.as_deref())?;
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            return Err(ValidationError::new(
                "endDate",
                format!("{end} is before start date {start}"),
            ));
        }
    }

    let description = input
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    Ok(Task {
        id: id.into(),
        title: title.to_string(),
        description,
        status,
        score,
        priority,
        start_date,
        end_date,
    })
}

/// Merge `patch` into `task` and re-validate the result. The task id is kept.
pub fn apply_patch(task: &Task, patch: &TaskPatch) -> Result<Task, ValidationError> {
    let merged = TaskInput {
        title: patch.title.clone().unwrap_or_else(|| task.title.clone()),
        description: patch.description.clone().or_else(|| task.description.clone()),
        status: Some(
            patch
                .status
                .clone()
                .unwrap_or_else(|| task.status.as_str().to_string()),
        ),
        priority: Some(
            patch
                .priority
                .clone()
                .unwrap_or_else(|| task.priority.as_str().to_string()),
        ),
        score: Some(patch.score.unwrap_or(task.score as i64)),
        start_date: patch
            .start_date
            .clone()
            .or_else(|| task.start_date.map(|d| d.to_string())),
        end_date: patch
            .end_date
            .clone()
            .or_else(|| task.end_date.map(|d| d.to_string())),
    };
    validate_task(task.id.clone(), &merged)
}

fn parse_date(field: &'static str, raw: Option<&str>) -> Result<Option<NaiveDate>, ValidationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| ValidationError::new(field, format!("'{s}' is not YYYY-MM-DD: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_title() {
        let err = validate_task("t1", &TaskInput::new("   ")).unwrap_err();
        assert_eq!(err.field, "title");
    }

    #[test]
    fn rejects_out_of_range_score() {
        let err = validate_task("t1", &TaskInput::new("Run").score(101)).unwrap_err();
        assert_eq!(err.field, "score");
        let err = validate_task("t1", &TaskInput::new("Run").score(-1)).unwrap_err();
        assert_eq!(err.field, "score");
    }

    #[test]
    fn rejects_unknown_status_and_priority() {
        let err = validate_task("t1", &TaskInput::new("Run").status("done")).unwrap_err();
        assert_eq!(err.field, "status");
        let err = validate_task("t1", &TaskInput::new("Run").priority("urgent")).unwrap_err();
        assert_eq!(err.field, "priority");
    }

    #[test]
    fn defaults_and_trimming() {
        let t = validate_task("t1", &TaskInput::new("  Run 5k  ").description("  ")).unwrap();
        assert_eq!(t.title, "Run 5k");
        assert_eq!(t.description, None);
        assert_eq!(t.status, TaskStatus::NotStarted);
        assert_eq!(t.priority, Priority::Medium);
        assert_eq!(t.score, 0);
    }

    #[test]
    fn end_date_must_not_precede_start() {
        let err = validate_task("t1", &TaskInput::new("Trip").dates("2025-05-10", "2025-05-01"))
            .unwrap_err();
        assert_eq!(err.field, "endDate");

        let err = validate_task("t1", &TaskInput::new("Trip").dates("10/05/2025", "")).unwrap_err();
        assert_eq!(err.field, "startDate");
    }

    #[test]
    fn patch_merges_and_revalidates() {
        let task = Task::new("t1", "Run").with_score(40);

        let updated = apply_patch(&task, &TaskPatch::status("completed")).unwrap();
        assert_eq!(updated.id, "t1");
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.score, 40);

        let err = apply_patch(&task, &TaskPatch::score(250)).unwrap_err();
        assert_eq!(err.field, "score");

        let cleared = apply_patch(
            &task.clone().with_description("old"),
            &TaskPatch {
                description: Some(String::new()),
                ..TaskPatch::default()
            },
        )
        .unwrap();
        assert_eq!(cleared.description, None);
    }
}
