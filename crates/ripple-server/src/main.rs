//! Ripple Server: Application entry point.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use ripple_auth::LogEmailSender;
use ripple_core::repository::SessionRepository;
use ripple_db::DbManager;
use ripple_db::repository::SurrealSessionRepository;
use ripple_server::{AppState, Mailer, ServerArgs, ServerConfig, build_router};
use tracing_subscriber::EnvFilter;

const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ripple=info".parse()?))
        .json()
        .init();

    tracing::info!("Starting Ripple server...");

    let config = ServerConfig::from(ServerArgs::parse());
    if config.auth.dev_mode {
        tracing::warn!("development session bypass is ENABLED");
    }

    let db = DbManager::connect(&config.db)
        .await
        .context("connecting to SurrealDB")?;
    let applied = ripple_db::run_migrations(db.client())
        .await
        .context("running migrations")?;
    tracing::info!(applied, "schema up to date");

    spawn_session_cleanup(SurrealSessionRepository::new(db.client().clone()));

    let state = AppState::new(
        db.client().clone(),
        config.auth.clone(),
        Mailer::Log(LogEmailSender),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Ripple server stopped.");
    Ok(())
}

fn spawn_session_cleanup<S: SessionRepository + 'static>(sessions: S) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            match sessions.cleanup_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "expired sessions removed"),
                Err(e) => tracing::error!(error = %e, "session cleanup failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
