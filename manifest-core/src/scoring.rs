//! Scoring settings and the totalScore aggregation policy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::task::TaskStatus;

/// Status -> score contribution, plus optional per-dimension weights used at
/// year level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringSettings {
    pub completed_score: f64,
    pub in_progress_score: f64,
    pub not_started_score: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dimension_weights: BTreeMap<String, f64>,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            completed_score: 100.0,
            in_progress_score: 50.0,
            not_started_score: 0.0,
            dimension_weights: BTreeMap::new(),
        }
    }
}

impl ScoringSettings {
    /// Score contribution of a task in `status`.
    pub fn contribution(&self, status: TaskStatus) -> f64 {
        match status {
            TaskStatus::Completed => self.completed_score,
            TaskStatus::InProgress => self.in_progress_score,
            TaskStatus::NotStarted => self.not_started_score,
        }
    }

    /// Weight of a dimension in the year score (default 1.0).
    pub fn weight_for(&self, dimension_id: &str) -> f64 {
        self.dimension_weights
            .get(dimension_id)
            .copied()
            .unwrap_or(1.0)
    }

    /// Replace non-finite values with the defaults.
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();
        if !self.completed_score.is_finite() {
            self.completed_score = d.completed_score;
        }
        if !self.in_progress_score.is_finite() {
            self.in_progress_score = d.in_progress_score;
        }
        if !self.not_started_score.is_finite() {
            self.not_started_score = d.not_started_score;
        }
        self.dimension_weights.retain(|_, w| w.is_finite());
        self
    }
}

/// How per-task contributions fold into a dimension's `totalScore`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreAggregation {
    /// Mean contribution per task; the UI labels this the self-rated average.
    #[default]
    Average,
    Sum,
}

impl ScoreAggregation {
    pub fn fold(&self, contributions: &[f64]) -> f64 {
        if contributions.is_empty() {
            return 0.0;
        }
        let sum: f64 = contributions.iter().sum();
        match self {
            ScoreAggregation::Sum => round2(sum),
            ScoreAggregation::Average => round2(sum / contributions.len() as f64),
        }
    }
}

/// Round to two decimals.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_contributions() {
        let s = ScoringSettings::default();
        assert_eq!(s.contribution(TaskStatus::Completed), 100.0);
        assert_eq!(s.contribution(TaskStatus::InProgress), 50.0);
        assert_eq!(s.contribution(TaskStatus::NotStarted), 0.0);
        assert_eq!(s.weight_for("health"), 1.0);
    }

    #[test]
    fn average_and_sum() {
        let c = [100.0, 0.0, 50.0];
        assert_eq!(ScoreAggregation::Average.fold(&c), 50.0);
        assert_eq!(ScoreAggregation::Sum.fold(&c), 150.0);
        assert_eq!(ScoreAggregation::Average.fold(&[]), 0.0);
        assert_eq!(ScoreAggregation::Average.fold(&[100.0, 0.0, 0.0]), 33.33);
    }

    #[test]
    fn partial_settings_fill_defaults() {
        let s: ScoringSettings = serde_json::from_str(r#"{"completedScore": 80}"#).unwrap();
        assert_eq!(s.completed_score, 80.0);
        assert_eq!(s.in_progress_score, 50.0);
    }
}
