mod api;
mod auth;
mod bootstrap;
mod health;

use std::sync::Arc;
use std::time::Duration;

use agentdesk_core::config::{AppConfig, LoadOptions};
use agentdesk_core::session::SessionStore;
use anyhow::{Context, Result};

const SESSION_PURGE_INTERVAL_SECS: u64 = 300;

fn init_logging(config: &AppConfig) {
    use agentdesk_core::config::LogFormat::*;
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
    // A missing .env file is normal outside local development.
    let _ = dotenvy::dotenv();

    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    spawn_session_purger(app.sessions.clone());

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding to {address}"))?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "agentdesk-server listening"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    axum::serve(listener, api::app(app.state))
        .with_graceful_shutdown(wait_for_shutdown(grace))
        .await
        .context("server exited")?;

    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "agentdesk-server stopped"
    );

    Ok(())
}

fn spawn_session_purger(sessions: Arc<dyn SessionStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SESSION_PURGE_INTERVAL_SECS));
        loop {
            interval.tick().await;
            sessions.purge_expired().await;
        }
    });
}

/// Resolves on Ctrl-C. In-flight requests then get `grace` to finish before
/// the process exits regardless.
async fn wait_for_shutdown(grace: Duration) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "shutdown requested; draining in-flight requests"
    );

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        tracing::warn!(
            event_name = "system.server.forced_exit",
            correlation_id = "shutdown",
            "graceful shutdown window elapsed"
        );
        std::process::exit(0);
    });
}
