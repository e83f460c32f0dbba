//! Alerting System
//!
//! Classifies glucose readings, debounces alerts against human
//! acknowledgment, and plays the alarm sound.

mod ack;
mod evaluator;
mod manager;
mod playback;

pub use ack::AckState;
pub use evaluator::{Classification, EvaluatorConfig, Evaluator, Excursion};
pub use manager::{AlertConfig, AlertManager, Debounce};
pub use playback::{Alarm, PlaybackError, PlayerAlarm, ALERT_SOUND, DEFAULT_PLAYER};
