//! Glucose Monitor Service
//!
//! Acknowledgment endpoint, health and metrics routes, logging set-up and
//! configuration for the `sugar-monitor` binary.

use alerting::AckState;
use axum::{
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub mod config;
mod routes;

pub use crate::config::{ConfigurationError, LogFormat, Settings};
pub use routes::health::HealthResponse;

/// Application state shared across handlers
pub struct AppState {
    /// Acknowledgment state shared with the monitor loop
    pub acks: Arc<AckState>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
    /// Prometheus handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state
    pub fn new(acks: Arc<AckState>) -> Self {
        Self {
            acks,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics: None,
        }
    }

    /// Serve metrics from the given recorder handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ack", get(routes::ack::acknowledge).post(routes::ack::acknowledge))
        .route("/health", get(routes::health::health))
        .route("/metrics", get(routes::metrics::render))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize logging; `RUST_LOG` overrides the default `info` level
pub fn init_logging(format: LogFormat) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    }
}

/// Serve the router on an already-bound listener
pub async fn run_server(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    let app = create_router(state);

    info!("Starting API server on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(Arc::new(AckState::new())))
    }

    async fn send(state: Arc<AppState>, method: Method, uri: &str) -> (StatusCode, String) {
        let response = create_router(state)
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_ack_records_time() {
        let state = state();
        let before = chrono::Utc::now() - chrono::Duration::milliseconds(1);

        let (status, body) = send(state.clone(), Method::POST, "/ack").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");

        let acked = state.acks.last_acknowledged_at().unwrap();
        assert!(acked >= before);
        assert_eq!(state.acks.acknowledgment_count(), 1);
    }

    #[tokio::test]
    async fn test_ack_overwrites_and_accepts_get() {
        let state = state();
        let first = chrono::DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let first_instant = tokio::time::Instant::now();
        state.acks.record(first_instant, first);

        let (status, body) = send(state.clone(), Method::GET, "/ack").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
        assert!(state.acks.last_acknowledged_at().unwrap() > first);
        assert!(state.acks.last_acknowledged_instant().unwrap() >= first_instant);
    }

    #[tokio::test]
    async fn test_concurrent_acks() {
        let state = state();
        let requests: Vec<_> = (0..32)
            .map(|_| tokio::spawn(send(state.clone(), Method::POST, "/ack")))
            .collect();

        for request in requests {
            assert_eq!(request.await.unwrap().0, StatusCode::OK);
        }
        assert_eq!(state.acks.acknowledgment_count(), 32);
        assert!(state.acks.last_acknowledged_at().is_some());
    }

    #[tokio::test]
    async fn test_health() {
        let state = state();
        let (status, body) = send(state.clone(), Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["last_acknowledged_at"], serde_json::Value::Null);
        assert_eq!(json["acknowledgment_count"], 0);

        state.acks.acknowledge();
        let (_, body) = send(state, Method::GET, "/health").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(json["last_acknowledged_at"].is_string());
        assert_eq!(json["acknowledgment_count"], 1);
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let (status, _) = send(state(), Method::GET, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let handle = PrometheusBuilder::new().build_recorder().handle();
        let state = Arc::new(AppState::new(Arc::new(AckState::new())).with_metrics(handle));
        let (status, _) = send(state, Method::GET, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, _) = send(state(), Method::GET, "/alerts").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
