//! Startup orchestration.
//!
//! Order: configuration is already loaded and logging installed by `main`;
//! here metrics start, the server is built, the config watcher is attached,
//! and the listener binds last so traffic arrives only when ready.

use std::path::Path;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::watcher::ConfigWatcher;
use crate::config::GatewayConfig;
use crate::http::{HttpServer, ServerError};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;

/// Fatal startup or serve errors.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run the gate until SIGINT/SIGTERM.
pub async fn run(config: GatewayConfig, config_path: Option<&Path>) -> Result<(), StartupError> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        cooldown_ms = config.rate_limit.cooldown_ms,
        max_requests_per_window = config.rate_limit.max_requests_per_window,
        window_ms = config.rate_limit.window_ms,
        retention_secs = config.rate_limit.retention_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;

    // Keep the watcher alive for the lifetime of the server.
    let (config_updates, _watcher) = match config_path {
        Some(path) => {
            let (watcher, updates) =
                ConfigWatcher::new(path, server.config().rate_limit.clone());
            match watcher.run() {
                Ok(handle) => (updates, Some(handle)),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload unavailable");
                    (updates, None)
                }
            }
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let mut server_task = tokio::spawn(server.run(listener, config_updates, server_shutdown));

    let finished_early = tokio::select! {
        _ = signals::wait_for_signal() => None,
        joined = &mut server_task => Some(joined),
    };
    let joined = match finished_early {
        Some(joined) => joined,
        None => {
            shutdown.trigger();
            server_task.await
        }
    };

    match joined {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "Server task panicked"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
