//! Glucose Monitor Loop
//!
//! Polls the reading source at a fixed cadence, classifies each reading,
//! and sounds the alarm for out-of-range values unless recently
//! acknowledged.

mod scheduler;

pub use scheduler::{CycleOutcome, MonitorConfig, MonitorLoop};
