//! Glucose Monitor - Main Entry Point

use alerting::{AckState, AlertConfig, AlertManager, Evaluator};
use anyhow::Context;
use api::{init_logging, run_server, AppState, LogFormat, Settings};
use metrics_exporter_prometheus::PrometheusBuilder;
use monitor::{MonitorConfig, MonitorLoop};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            init_logging(LogFormat::Text)?;
            error!("Creating configuration failed: {}", e);
            return Err(e.into());
        }
    };
    init_logging(settings.log_format)?;

    info!("=== Sugar Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("installing metrics recorder")?;

    let acks = Arc::new(AckState::new());

    let mut monitor = MonitorLoop::new(
        MonitorConfig::default(),
        settings.source()?,
        settings.alarm()?,
        Evaluator::default(),
        AlertManager::new(AlertConfig::default(), Arc::clone(&acks)),
    );
    if let Some(forwarder) = settings.forwarder()? {
        monitor = monitor.with_forwarder(forwarder);
    }

    let state = Arc::new(AppState::new(acks).with_metrics(metrics));
    let listener = TcpListener::bind(settings.listen_addr)
        .await
        .with_context(|| format!("binding {}", settings.listen_addr))?;

    // Monitor loop runs on its own task, independent of request handling.
    let mut monitor_task = tokio::spawn(async move { monitor.run().await });

    tokio::select! {
        result = run_server(listener, state) => {
            monitor_task.abort();
            result.context("acknowledgment server stopped")?;
        }
        result = &mut monitor_task => {
            result.context("monitor loop stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            monitor_task.abort();
        }
    }

    Ok(())
}
