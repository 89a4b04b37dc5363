//! Configuration file watcher for live policy reload.
//!
//! Only the admission policy is applied while running; every other section
//! is read once at startup. Reloads that leave the policy untouched are not
//! forwarded.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::{GatewayConfig, RateLimitConfig};

/// Watches one config file and emits validated configurations whose
/// `[rate_limit]` section changed.
pub struct ConfigWatcher {
    path: PathBuf,
    current: Mutex<RateLimitConfig>,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// `initial` is the policy already in force.
    pub fn new(
        path: &Path,
        initial: RateLimitConfig,
    ) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            current: Mutex::new(initial),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. The returned handle must be kept alive.
    ///
    /// The parent directory is watched so files replaced by rename (as most
    /// editors save) keep being picked up.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if ours && matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        self.reload();
                    }
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(dir = ?dir, "Config watcher started");
        Ok(watcher)
    }

    /// Re-read the file and forward it if the policy changed.
    fn reload(&self) {
        let config = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Config reload rejected, keeping current policy");
                return;
            }
        };

        if !self.policy_changed(&config.rate_limit) {
            tracing::debug!(path = ?self.path, "Config touched, admission policy unchanged");
            return;
        }

        tracing::info!(
            enabled = config.rate_limit.enabled,
            cooldown_ms = config.rate_limit.cooldown_ms,
            max_requests = config.rate_limit.max_requests_per_window,
            window_ms = config.rate_limit.window_ms,
            "Admission policy reloaded"
        );
        let _ = self.update_tx.send(config);
    }

    /// Record `next` as current; true when it differs from the previous policy.
    fn policy_changed(&self, next: &RateLimitConfig) -> bool {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == *next {
            return false;
        }
        *current = next.clone();
        true
    }
}
