//! Freshness and Range Evaluation

use chrono::{DateTime, Duration, Utc};
use glucose_source::Reading;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Readings older than this are stale (seconds)
    pub max_age_seconds: i64,
    /// Below this is low (mmol/L)
    pub low_threshold: f64,
    /// Above this is high (mmol/L)
    pub high_threshold: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_age_seconds: 15 * 60,
            low_threshold: 5.0,
            high_threshold: 12.0,
        }
    }
}

/// Which side of the safe range a reading fell on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Excursion {
    Low,
    High,
}

/// Outcome of evaluating one reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification {
    /// Fresh and within `[low, high]`
    InRange,
    /// Fresh and outside the safe range
    AlertWorthy(Excursion),
    /// Too old to act on; treated as no data
    Stale { age: Duration },
}

impl Classification {
    pub fn is_alert_worthy(&self) -> bool {
        matches!(self, Classification::AlertWorthy(_))
    }
}

/// Turns readings into classifications
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Classify a reading at time `now`
    pub fn classify(&self, reading: &Reading, now: DateTime<Utc>) -> Classification {
        self.classify_at(reading.measured_at(), reading.concentration(), now)
    }

    /// Classify a raw measurement; freshness is checked before range
    pub fn classify_at(
        &self,
        measured_at: DateTime<Utc>,
        concentration: f64,
        now: DateTime<Utc>,
    ) -> Classification {
        let age = now - measured_at;
        if age > Duration::seconds(self.config.max_age_seconds) {
            debug!("Reading is stale: measured {}s ago", age.num_seconds());
            return Classification::Stale { age };
        }

        // Exactly on a threshold is in range
        if concentration < self.config.low_threshold {
            Classification::AlertWorthy(Excursion::Low)
        } else if concentration > self.config.high_threshold {
            Classification::AlertWorthy(Excursion::High)
        } else {
            Classification::InRange
        }
    }
}
