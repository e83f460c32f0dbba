//! Acknowledgment Route
//!
//! One human, one button: any request silences alerts for the cool-down
//! window. Never fails.

use axum::extract::State;
use std::sync::Arc;
use tracing::info;

use crate::AppState;

/// Record an acknowledgment at the current time
pub async fn acknowledge(State(state): State<Arc<AppState>>) -> &'static str {
    info!("Received ack request");
    state.acks.acknowledge();
    metrics::counter!("acknowledgments_total").increment(1);
    "ok"
}
