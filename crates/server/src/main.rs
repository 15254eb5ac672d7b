mod api;
mod bootstrap;
mod health;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use staffer_core::config::{AppConfig, LoadOptions, LogFormat};

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let routes = health::router(app.db_pool.clone()).merge(api::router(api::ApiState {
        controller: app.controller.clone(),
        repository: app.repository.clone(),
    }));

    let address =
        format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "staffer-server started"
    );

    let drain_secs = app.config.server.graceful_shutdown_secs;
    axum::serve(listener, routes)
        .with_graceful_shutdown(wait_for_shutdown(drain_secs))
        .await?;

    tracing::info!(event_name = "system.server.stopping", "staffer-server stopping");

    Ok(())
}

async fn wait_for_shutdown(drain_secs: u64) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!(
        event_name = "system.server.shutdown_signal",
        drain_secs,
        "shutdown requested, draining connections"
    );
}
