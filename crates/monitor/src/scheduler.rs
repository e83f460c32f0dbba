//! Monitor Loop Implementation
//!
//! ```text
//!  Idle ─► Fetching ─┬─ error/timeout ──────────────► Sleeping-after-error (retry delay)
//!                    └─ reading ─► Evaluating ─┬─ Stale / InRange ───────► Idle
//!                                              └─ AlertWorthy ─┬─ acked ─► Suppressing
//!                                                              └─────────► Alerting
//! ```
//!
//! Every branch ends in a sleep; nothing but process shutdown ends the loop.

use alerting::{Alarm, AlertManager, Classification, Debounce, Evaluator};
use analytics_sync::AnalyticsForwarder;
use chrono::Utc;
use glucose_source::ReadingSource;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Configuration for the monitor loop
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Delay between cycles
    pub interval: Duration,
    /// Delay before retrying after a failed fetch
    pub retry_delay: Duration,
    /// Bound on a single fetch
    pub fetch_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            retry_delay: Duration::from_secs(15),
            fetch_timeout: glucose_source::DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// What a single cycle ended with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No reading this cycle
    FetchFailed,
    /// Reading too old to act on
    Stale,
    InRange,
    /// Out of range but acknowledged within the cool-down
    Suppressed,
    /// Alarm played
    Alerted,
    /// Alarm should have played but failed
    PlaybackFailed,
}

impl CycleOutcome {
    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::FetchFailed => "fetch_failed",
            CycleOutcome::Stale => "stale",
            CycleOutcome::InRange => "in_range",
            CycleOutcome::Suppressed => "suppressed",
            CycleOutcome::Alerted => "alerted",
            CycleOutcome::PlaybackFailed => "playback_failed",
        }
    }
}

/// Polling loop tying the source, evaluator, debounce and alarm together
pub struct MonitorLoop<S, A> {
    config: MonitorConfig,
    source: S,
    alarm: A,
    evaluator: Evaluator,
    alerts: AlertManager,
    forwarder: Option<AnalyticsForwarder>,
}

impl<S: ReadingSource, A: Alarm> MonitorLoop<S, A> {
    /// Create a new monitor loop
    pub fn new(
        config: MonitorConfig,
        source: S,
        alarm: A,
        evaluator: Evaluator,
        alerts: AlertManager,
    ) -> Self {
        info!(
            "Monitor loop created: interval={:?}, retry_delay={:?}",
            config.interval, config.retry_delay
        );

        Self {
            config,
            source,
            alarm,
            evaluator,
            alerts,
            forwarder: None,
        }
    }

    /// Forward every fetched reading to analytics
    pub fn with_forwarder(mut self, forwarder: AnalyticsForwarder) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Run cycles forever
    pub async fn run(&self) {
        info!("Starting monitor loop");

        loop {
            let outcome = self.run_cycle().await;
            metrics::counter!("monitor_cycles_total", "outcome" => outcome.as_str()).increment(1);

            tokio::time::sleep(self.delay_after(outcome)).await;
        }
    }

    /// How long to sleep after a cycle
    pub fn delay_after(&self, outcome: CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::FetchFailed => self.config.retry_delay,
            _ => self.config.interval,
        }
    }

    /// Execute one fetch-evaluate-alert cycle
    pub async fn run_cycle(&self) -> CycleOutcome {
        info!("Getting current blood sugar");

        let fetched = tokio::time::timeout(self.config.fetch_timeout, self.source.fetch_latest()).await;
        let reading = match fetched {
            Ok(Ok(reading)) => reading,
            Ok(Err(e)) => {
                error!("Getting current blood sugar failed: {}", e);
                return CycleOutcome::FetchFailed;
            }
            Err(_) => {
                error!(
                    "Getting current blood sugar timed out after {:?}",
                    self.config.fetch_timeout
                );
                return CycleOutcome::FetchFailed;
            }
        };

        info!(
            mmol = reading.concentration(),
            mgdl = reading.sgv(),
            measured_at = %reading.measured_at(),
            "Got blood sugar"
        );

        if let Some(forwarder) = &self.forwarder {
            forwarder.spawn_forward(reading.clone());
        }

        match self.evaluator.classify(&reading, Utc::now()) {
            Classification::Stale { age } => {
                warn!(
                    "Last reading not fresh, measured {} minutes ago; ignoring",
                    age.num_minutes()
                );
                CycleOutcome::Stale
            }
            Classification::InRange => CycleOutcome::InRange,
            Classification::AlertWorthy(excursion) => {
                info!("Blood sugar {:?} at {:.1} mmol/L, alerting", excursion, reading.concentration());

                match self.alerts.check(Instant::now()) {
                    Debounce::Suppress { since_ack, .. } => {
                        info!(
                            "Already acknowledged {} minutes ago, not alerting",
                            since_ack.as_secs() / 60
                        );
                        CycleOutcome::Suppressed
                    }
                    Debounce::Fire => match self.alarm.play().await {
                        Ok(()) => CycleOutcome::Alerted,
                        Err(e) => {
                            error!("Playing alert failed: {}", e);
                            CycleOutcome::PlaybackFailed
                        }
                    },
                }
            }
        }
    }
}
