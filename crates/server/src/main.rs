mod bootstrap;
mod collaborators;
mod health;
mod integrations;
mod queue;
mod webhooks;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use callbridge_core::config::{AppConfig, LoadOptions};
use tokio::sync::watch;

use crate::integrations::IntegrationState;
use crate::queue::{run_worker, WorkerSettings};
use crate::webhooks::WebhookState;

fn init_logging(config: &AppConfig) {
    use callbridge_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging must be up before bootstrap emits its first event.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(run_worker(
        app.work_receiver,
        app.dispatcher.clone(),
        app.queue.clone(),
        WorkerSettings::default(),
        shutdown_rx,
    ));

    let routes = health::router(app.db_pool.clone())
        .merge(webhooks::router(WebhookState {
            configs: app.webhook_configs.clone(),
            queue: Arc::new(app.queue.clone()),
            destination: app.config.sync.webhook_destination.clone(),
        }))
        .merge(integrations::router(IntegrationState {
            registration: app.registration.clone(),
            bulk: app.bulk.clone(),
        }));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        registration_enabled = app.registration.is_some(),
        "callbridge-server started"
    );

    axum::serve(listener, routes).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "server.stopping",
        correlation_id = "shutdown",
        "callbridge-server stopping"
    );
    let _ = shutdown_tx.send(true);

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, worker).await {
        Ok(Ok(stats)) => tracing::info!(
            event_name = "server.worker.stopped",
            correlation_id = "shutdown",
            succeeded = stats.succeeded,
            retried = stats.retried,
            dropped = stats.dropped,
            "worker drained"
        ),
        Ok(Err(error)) => tracing::error!(
            event_name = "server.worker.panicked",
            correlation_id = "shutdown",
            error = %error,
            "worker task failed"
        ),
        Err(_) => tracing::warn!(
            event_name = "server.worker.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "worker did not finish before the grace period"
        ),
    }

    app.db_pool.close().await;
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "server.signal_failed",
            error = %error,
            "could not listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}
