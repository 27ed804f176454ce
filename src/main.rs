//! DonorLink Agent: keeps a logged-in user's matches and notifications in sync.
//!
//! Main entry point that wires all crates together and runs until a
//! shutdown signal arrives.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{EnvFilter, fmt};

use donorlink_auth::{SessionFile, SessionStore};
use donorlink_core::config::AppConfig;
use donorlink_gateway::HttpGateway;
use donorlink_realtime::{NotificationSync, WsConnector};
use donorlink_service::MatchService;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = ?e, "Agent error");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> anyhow::Result<AppConfig> {
    let config_path =
        std::env::var("DONORLINK_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let env = std::env::var("DONORLINK_ENV").ok();

    AppConfig::load(&config_path, env.as_deref())
        .with_context(|| format!("loading '{config_path}' (env: {env:?})"))
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting DonorLink agent v{}", env!("CARGO_PKG_VERSION"));

    let session_file = SessionFile::new(&config.session.file);
    let saved = session_file
        .load()
        .await
        .context("reading saved session")?
        .context("no saved session; run `donorlink login` first")?;

    let gateway = Arc::new(HttpGateway::new(&config.api).context("building HTTP client")?);
    let connector = Arc::new(WsConnector::new(config.realtime.ws_url.clone()));
    let sessions = SessionStore::new();

    let matches = MatchService::new(gateway.clone(), sessions.clone(), &config.matching);
    let sync = Arc::new(NotificationSync::new(
        connector,
        gateway,
        config.realtime.clone(),
    ));
    let binding = Arc::clone(&sync).bind(sessions.clone());

    let mut arrivals = sync.subscribe_arrivals();
    let mut unread = sync.subscribe_unread();
    let mut channel_state = sync.watch_channel_state();

    let session = sessions.login(saved);
    tracing::info!(user_id = %session.user_id, "Session restored");
    match matches.load_all().await {
        Ok(count) => tracing::info!(count, active = matches.active().len(), "Matches loaded"),
        Err(e) => tracing::warn!(error = %e, "Initial match load failed"),
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
            arrival = arrivals.recv() => match arrival {
                Ok(record) if record.kind.affects_matches() => {
                    tracing::info!(
                        notification_id = %record.id,
                        kind = %record.kind,
                        match_id = ?record.match_id(),
                        "Match update pushed, reloading matches"
                    );
                    if let Err(e) = matches.load_all().await {
                        tracing::warn!(error = %e, "Match reload failed");
                    }
                }
                Ok(record) => {
                    tracing::info!(notification_id = %record.id, kind = %record.kind, title = %record.title, "Notification");
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Arrivals lagged, refreshing");
                    if let Err(e) = sync.refresh().await {
                        tracing::warn!(error = %e, "Refresh failed");
                    }
                }
                Err(RecvError::Closed) => break,
            },
            Ok(()) = unread.changed() => {
                let count = *unread.borrow_and_update();
                tracing::info!(unread = count, "Unread badge");
            }
            Ok(()) = channel_state.changed() => {
                let state = *channel_state.borrow_and_update();
                if state.is_connected() {
                    // Pushes may have been missed while disconnected.
                    if let Err(e) = sync.refresh().await {
                        tracing::warn!(error = %e, "Refresh after reconnect failed");
                    }
                }
            }
        }
    }

    sessions.logout();
    matches.clear();
    drop(matches);
    drop(sessions);
    if let Err(e) = binding.await {
        tracing::warn!(error = %e, "Session binding task failed");
    }
    tracing::info!("DonorLink agent stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
