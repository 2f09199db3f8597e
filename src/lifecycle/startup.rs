//! Startup orchestration.
//!
//! Config first, then logging and metrics, then the gates, then the
//! listener. Any failure before the listener is bound is fatal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::{load_config, ConfigError, ConfigWatcher, GateConfig};
use crate::http::{Dependencies, HttpServer};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Load the config file, or defaults plus environment overrides when no
/// file is given.
pub fn load(path: Option<&Path>) -> Result<GateConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => crate::config::loader::parse_config("", |var| std::env::var(var).ok()),
    }
}

/// Run the server until SIGINT/SIGTERM.
pub async fn run(config_path: Option<PathBuf>) -> Result<(), StartupError> {
    let config = load(config_path.as_deref())?;

    logging::init_logging(&config.observability, config.environment);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        "sitegate starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                error = %e,
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut server = HttpServer::new(config.clone(), Dependencies::default())?;

    // Keep the watcher alive for the life of the server.
    let _watcher = match &config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => {
                    server = server.with_config_updates(updates);
                    Some(handle)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload unavailable");
                    None
                }
            }
        }
        None => None,
    };

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    let shutdown = Arc::new(Shutdown::new());
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let signal = signals::wait_for_shutdown().await;
            tracing::info!(signal, "Shutdown signal received");
            shutdown.trigger();
        });
    }

    server.run(listener, shutdown).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
