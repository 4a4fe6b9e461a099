//! `vault-server` binary: loads configuration, opens the SQLite store and
//! serves HTTP until SIGINT or SIGTERM.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use vault_db::{SqliteStore, StoreError};
use vault_server::config::{self, Config, LoggingConfig};
use vault_server::{app, AppState};

#[derive(Debug, Error)]
enum StartupError {
    #[error("cannot open store: {0}")]
    Store(#[from] StoreError),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server stopped unexpectedly: {0}")]
    Serve(std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let path = config_path();
    let config = match config::load_config(Some(path.as_str())) {
        Ok(config) => config,
        Err(err) => {
            // No subscriber yet.
            eprintln!("vault-server: {path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.logging);
    tracing::info!(%path, "configuration loaded");

    match run(config).await {
        Ok(()) => {
            tracing::info!("vault server stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "vault server failed");
            ExitCode::FAILURE
        }
    }
}

/// First CLI argument, then `VAULT_CONFIG_PATH`, then `config.toml`.
fn config_path() -> String {
    let non_blank = |value: &String| !value.trim().is_empty();
    std::env::args()
        .nth(1)
        .filter(non_blank)
        .or_else(|| std::env::var("VAULT_CONFIG_PATH").ok().filter(non_blank))
        .unwrap_or_else(|| "config.toml".to_string())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    let store = SqliteStore::open(&config.database.path, config.database.settings())?;
    let policy = config.notifications.delivery_policy();

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;
    tracing::info!(%addr, ?policy, "vault server listening");

    axum::serve(listener, app(AppState::new(Arc::new(store), policy)))
        .with_graceful_shutdown(shutdown_requested())
        .await
        .map_err(StartupError::Serve)
}

async fn shutdown_requested() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    let _ = tokio::signal::ctrl_c().await;

    tracing::info!("shutdown requested, draining connections");
}
