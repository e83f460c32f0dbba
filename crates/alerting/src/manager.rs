//! Alert Manager Implementation
//!
//! Decides whether an alert-worthy reading should actually sound, given
//! the most recent human acknowledgment.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::ack::AckState;

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Quiet period after an acknowledgment (seconds)
    pub cooldown_seconds: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 1800, // 30 minutes
        }
    }
}

/// Result of the debounce check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Debounce {
    /// Sound the alarm
    Fire,
    /// Acknowledged recently; stay quiet
    Suppress {
        since_ack: Duration,
        remaining: Duration,
    },
}

impl Debounce {
    /// Apply the cool-down rule to the time elapsed since the last
    /// acknowledgment, if there was one
    pub fn evaluate(since_ack: Option<Duration>, cooldown: Duration) -> Self {
        match since_ack {
            Some(since_ack) if since_ack < cooldown => Debounce::Suppress {
                since_ack,
                remaining: cooldown - since_ack,
            },
            _ => Debounce::Fire,
        }
    }
}

/// Debounces alerts against the shared acknowledgment state.
///
/// Any acknowledgment silences every alert-worthy reading for the
/// cool-down window, not only the episode that was acknowledged.
pub struct AlertManager {
    config: AlertConfig,
    acks: Arc<AckState>,
}

impl AlertManager {
    /// Create a new alert manager
    pub fn new(config: AlertConfig, acks: Arc<AckState>) -> Self {
        info!("Creating alert manager with config: {:?}", config);
        Self { config, acks }
    }

    /// Check whether an alert-worthy reading should fire at monotonic `now`
    pub fn check(&self, now: Instant) -> Debounce {
        let decision = Debounce::evaluate(self.acks.elapsed_since_ack(now), self.cooldown());

        if let Debounce::Suppress { since_ack, remaining } = decision {
            debug!(
                "Alert suppressed: acknowledged {}s ago, {}s of cool-down left",
                since_ack.as_secs(),
                remaining.as_secs()
            );
        }

        decision
    }

    /// Cool-down window as a duration
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.config.cooldown_seconds)
    }

    /// Shared acknowledgment state
    pub fn acks(&self) -> &Arc<AckState> {
        &self.acks
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(AlertConfig::default(), Arc::new(AckState::new()))
    }
}
