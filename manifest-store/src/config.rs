//! Runtime policy for the store.

use chrono_tz::Tz;
use manifest_core::ScoreAggregation;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreConfig {
    /// How task contributions fold into a dimension's totalScore.
    pub aggregation: ScoreAggregation,
    /// Timezone for "current month" lookups.
    pub timezone: Tz,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            aggregation: ScoreAggregation::Average,
            timezone: chrono_tz::Asia::Shanghai,
        }
    }
}

impl StoreConfig {
    pub fn with_aggregation(mut self, aggregation: ScoreAggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }
}
