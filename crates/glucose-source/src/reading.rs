//! Glucose Reading Value Object

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::SourceError;

/// mg/dL per mmol/L for glucose
pub const MGDL_PER_MMOL: f64 = 18.0;

/// A single glucose measurement.
///
/// Immutable once constructed; `concentration` is always non-negative and in
/// mmol/L.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    identifier: String,
    measured_at: DateTime<Utc>,
    sgv: i64,
    concentration: f64,
}

impl Reading {
    /// Build a reading from a raw sensor glucose value in mg/dL
    pub fn from_mgdl(
        identifier: impl Into<String>,
        measured_at: DateTime<Utc>,
        sgv: i64,
    ) -> Result<Self, SourceError> {
        if sgv < 0 {
            return Err(SourceError::InvalidValue(sgv));
        }

        Ok(Self {
            identifier: identifier.into(),
            measured_at,
            sgv,
            concentration: sgv as f64 / MGDL_PER_MMOL,
        })
    }

    /// Source-assigned identifier of the entry
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// When the sensor took the measurement (source clock)
    pub fn measured_at(&self) -> DateTime<Utc> {
        self.measured_at
    }

    /// Raw sensor glucose value (mg/dL)
    pub fn sgv(&self) -> i64 {
        self.sgv
    }

    /// Glucose concentration (mmol/L)
    pub fn concentration(&self) -> f64 {
        self.concentration
    }
}
