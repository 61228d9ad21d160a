//! manifest-core: domain model and aggregation rules for Manifest, the
//! personal performance tracker.
//!
//! Nothing here does I/O. Storage and the stateful store live in
//! `manifest-store`.

pub mod dimension;
pub mod scoring;
pub mod task;
pub mod time;
pub mod validate;
pub mod year;

pub use dimension::{Dimension, DimensionPatch, NewDimension, default_dimensions};
pub use scoring::{ScoreAggregation, ScoringSettings};
pub use task::{Priority, Task, TaskInput, TaskPatch, TaskStatus};
pub use time::{YearKeyError, current_month, current_year_key, validate_year_key};
pub use validate::{ValidationError, apply_patch, validate_task};
pub use year::{
    DimensionSettings, DimensionYearData, MONTHS, MonthSummary, QUARTERS, YearData,
    YearSettings, normalize_year_data, normalize_year_data_with, progress_percent,
};

#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    fn arb_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::NotStarted),
            Just(TaskStatus::InProgress),
            Just(TaskStatus::Completed),
        ]
    }

    fn arb_dimension() -> impl Strategy<Value = DimensionYearData> {
        (
            prop::collection::vec(prop::collection::vec((arb_status(), 0u8..=100), 0..4), 0..15),
            prop::collection::vec(".{0,5}", 0..6),
        )
            .prop_map(|(months, quarters)| {
                let mut dim = DimensionYearData {
                    quarterly_goals: quarters,
                    monthly_tasks: Vec::new(),
                    ..DimensionYearData::default()
                };
                for (m, tasks) in months.into_iter().enumerate() {
                    dim.monthly_tasks.push(
                        tasks
                            .into_iter()
                            .enumerate()
                            .map(|(i, (status, score))| {
                                // Duplicate ids on purpose for some months.
                                Task::new(format!("t{}-{}", m % 3, i), "task")
                                    .with_status(status)
                                    .with_score(score)
                            })
                            .collect(),
                    );
                }
                dim
            })
    }

    fn arb_year() -> impl Strategy<Value = YearData> {
        prop::collection::btree_map("[a-z]{1,6}", arb_dimension(), 0..4).prop_map(|dims| {
            let mut year = YearData::empty("2025");
            year.dimensions = dims;
            year
        })
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(raw in arb_year()) {
            let once = normalize_year_data(raw);
            let twice = normalize_year_data(once.clone());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn aggregates_match_tasks(raw in arb_year()) {
            let year = normalize_year_data(raw);
            for dim in year.dimensions.values() {
                prop_assert_eq!(dim.quarterly_goals.len(), QUARTERS);
                prop_assert_eq!(dim.monthly_tasks.len(), MONTHS);
                let total: usize = dim.monthly_tasks.iter().map(Vec::len).sum();
                let completed = dim.tasks().filter(|t| t.is_completed()).count();
                prop_assert_eq!(dim.total_tasks, total);
                prop_assert_eq!(dim.completed_tasks, completed);
                prop_assert!(dim.progress <= 100);
                if total == 0 {
                    prop_assert_eq!(dim.progress, 0);
                } else {
                    let exact = completed as f64 * 100.0 / total as f64;
                    prop_assert!((dim.progress as f64 - exact).abs() <= 0.5 + 1e-9);
                }
            }
        }
    }
}
