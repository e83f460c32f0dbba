//! Analytics Forwarding Module
//!
//! Posts each fetched reading to a Tinybird events endpoint:
//! - Only active when a token is configured
//! - Each forward runs in its own task with a bounded timeout
//! - Failures are logged and dropped, never retried

use chrono::{DateTime, Utc};
use glucose_source::Reading;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Tinybird events endpoint for the `nightscout` data source
pub const DEFAULT_ENDPOINT: &str = "https://api.tinybird.co/v0/events?name=nightscout";

/// Bound on a single forward
pub const FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

/// Analytics forward error types
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Client setup failed: {0}")]
    Client(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Forward timed out after {0:?}")]
    Timeout(Duration),

    #[error("Sink rejected event with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Analytics configuration
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Events endpoint
    pub endpoint: String,
    /// Bearer token
    pub token: String,
    /// Request timeout
    pub timeout: Duration,
}

impl AnalyticsConfig {
    /// Config for the default endpoint with the given token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: token.into(),
            timeout: FORWARD_TIMEOUT,
        }
    }
}

/// Event body sent to the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingEvent {
    pub id: String,
    pub glucose_mmol: f64,
    pub glucose_mgdl: i64,
    pub timestamp: DateTime<Utc>,
}

impl From<&Reading> for ReadingEvent {
    fn from(reading: &Reading) -> Self {
        Self {
            id: reading.identifier().to_string(),
            glucose_mmol: reading.concentration(),
            glucose_mgdl: reading.sgv(),
            timestamp: reading.measured_at(),
        }
    }
}

/// Forwards readings to the analytics sink
#[derive(Clone)]
pub struct AnalyticsForwarder {
    config: Arc<AnalyticsConfig>,
    http: reqwest::Client,
}

impl AnalyticsForwarder {
    /// Create new forwarder
    pub fn new(config: AnalyticsConfig) -> Result<Self, ForwardError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ForwardError::Client(e.to_string()))?;

        info!("Analytics forwarding enabled: {}", config.endpoint);
        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    /// Post one reading and wait for the sink's answer
    pub async fn forward(&self, reading: &Reading) -> Result<(), ForwardError> {
        let event = ReadingEvent::from(reading);

        let response = self
            .http
            .post(&self.config.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.config.token))
            .header(CONTENT_TYPE, "application/json")
            .json(&event)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(ForwardError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Sent reading {} to analytics: {}", event.id, body);
        Ok(())
    }

    /// Forward in the background; the caller never waits on or sees the result
    pub fn spawn_forward(&self, reading: Reading) -> JoinHandle<()> {
        let forwarder = self.clone();
        tokio::spawn(async move {
            if let Err(e) = forwarder.forward(&reading).await {
                metrics::counter!("analytics_forward_failures_total").increment(1);
                error!("Sending reading to analytics failed: {}", e);
            }
        })
    }

    fn classify(&self, err: reqwest::Error) -> ForwardError {
        if err.is_timeout() {
            ForwardError::Timeout(self.config.timeout)
        } else {
            ForwardError::Request(err.to_string())
        }
    }
}
