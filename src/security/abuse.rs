//! Per-client abuse control.
//!
//! Every client identifier owns a [`ClientRecord`]: the instant of its last
//! allowed request and the allowed requests inside the trailing spam window.
//! A request is admitted only when the window still has room and the
//! cooldown since the previous allowed request has elapsed. The window gate
//! is checked first, so a client over both limits is reported as spam.
//!
//! # Concurrency
//! Records live in a [`DashMap`]. [`AbuseControl::evaluate`] runs the whole
//! prune/compare/update sequence while holding the key's shard write lock,
//! so concurrent requests from one client can never both pass the cooldown.
//! The sweeper uses `retain`, which takes the same locks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::alerts::{Alert, AuditReporter, EventKind, RequestMeta};
use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The client came back before the cooldown elapsed.
    Cooldown,
    /// The client already used its quota for the current window.
    SpamLimit,
}

impl DenyReason {
    /// Machine-readable tag used in the 429 body.
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::Cooldown => "rate_limit",
            DenyReason::SpamLimit => "spam",
        }
    }
}

/// Details of a refused request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub reason: DenyReason,
    /// How long the client should wait before retrying.
    pub retry_after: Duration,
    /// Allowed requests currently inside the spam window.
    pub window_count: usize,
    /// Length of the spam window in force when the decision was made.
    pub window: Duration,
}

impl Denial {
    /// Retry hint in whole seconds, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        let millis = self.retry_after.as_millis().div_ceil(1000);
        u64::try_from(millis).unwrap_or(u64::MAX)
    }

    /// Human readable explanation stating the wait time.
    pub fn message(&self) -> String {
        match self.reason {
            DenyReason::Cooldown => {
                format!("Please wait {} seconds", self.retry_after_secs())
            }
            DenyReason::SpamLimit => format!(
                "Too many requests ({} in {} seconds). Please try again in {} seconds.",
                self.window_count,
                self.window.as_secs(),
                self.retry_after_secs()
            ),
        }
    }
}

/// Outcome of [`AbuseControl::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Request history of one client.
#[derive(Debug, Default)]
struct ClientRecord {
    last_request_at: Option<Instant>,
    /// Oldest first.
    recent_request_times: VecDeque<Instant>,
}

impl ClientRecord {
    /// Drop window entries that are `window` or more older than `now`.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.recent_request_times.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.recent_request_times.pop_front();
            } else {
                break;
            }
        }
    }

    fn newest(&self) -> Option<Instant> {
        let back = self.recent_request_times.back().copied();
        match (self.last_request_at, back) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Process-wide admission gate.
///
/// Build one at startup, share it through an `Arc`, and call
/// [`AbuseControl::shutdown`] to stop the sweeper.
pub struct AbuseControl {
    clients: DashMap<String, ClientRecord>,
    policy: ArcSwap<RateLimitConfig>,
    reporter: AuditReporter,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl AbuseControl {
    pub fn new(policy: RateLimitConfig, reporter: AuditReporter) -> Self {
        Self {
            clients: DashMap::new(),
            policy: ArcSwap::from_pointee(policy),
            reporter,
            sweeper: Mutex::new(None),
        }
    }

    /// Decide whether a request from `client_id` at `now` may proceed.
    ///
    /// Never fails. Denied requests leave the client's history untouched.
    pub fn evaluate(&self, client_id: &str, now: Instant) -> Decision {
        let policy = self.policy.load();
        if !policy.enabled {
            return Decision::Allowed;
        }
        let window = policy.window();
        let cooldown = policy.cooldown();

        // The entry guard holds the shard lock until the end of this scope.
        let mut record = self.clients.entry(client_id.to_owned()).or_default();
        record.prune(now, window);

        let window_count = record.recent_request_times.len();
        if window_count >= policy.max_requests_per_window {
            let retry_after = record
                .recent_request_times
                .front()
                .map(|&oldest| window.saturating_sub(now.saturating_duration_since(oldest)))
                .unwrap_or(window);
            return Decision::Denied(Denial {
                reason: DenyReason::SpamLimit,
                retry_after,
                window_count,
                window,
            });
        }

        if let Some(last) = record.last_request_at {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < cooldown {
                return Decision::Denied(Denial {
                    reason: DenyReason::Cooldown,
                    retry_after: cooldown - elapsed,
                    window_count,
                    window,
                });
            }
        }

        record.last_request_at = Some(now);
        record.recent_request_times.push_back(now);
        Decision::Allowed
    }

    /// Admission gate used by the HTTP middleware.
    ///
    /// Evaluates the request and queues the alerts a denial calls for.
    pub fn admit(&self, meta: &RequestMeta) -> Decision {
        let decision = self.evaluate(&meta.client_id, Instant::now());

        match &decision {
            Decision::Allowed => metrics::record_admission("allowed"),
            Decision::Denied(denial) => {
                tracing::warn!(
                    client = %meta.client_id,
                    path = %meta.path,
                    reason = denial.reason.as_str(),
                    retry_after_ms = denial.retry_after.as_millis() as u64,
                    "Request denied"
                );
                metrics::record_admission(denial.reason.as_str());

                if denial.reason == DenyReason::SpamLimit {
                    self.reporter.notify(
                        Alert::new(EventKind::SpamAlert, &meta.path, meta.clone())
                            .with_detail(format!(
                                "{} requests in {} seconds",
                                denial.window_count,
                                denial.window.as_secs()
                            )),
                    );
                }
                self.reporter.notify(
                    Alert::new(EventKind::Blocked, &meta.path, meta.clone())
                        .with_param("reason", denial.reason.as_str())
                        .with_detail(denial.message()),
                );
            }
        }

        decision
    }

    /// Evict records untouched for longer than the retention horizon.
    ///
    /// A record whose spam window or cooldown is still running is kept
    /// whatever the configured retention.
    ///
    /// Returns the number of records removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let policy = self.policy.load();
        let window = policy.window();
        // Never shorter than the window or cooldown, or eviction would
        // forget state that still decides admission.
        let horizon = policy.retention().max(window).max(policy.cooldown());

        let before = self.clients.len();
        self.clients.retain(|_, record| {
            record.prune(now, window);
            record
                .newest()
                .is_some_and(|t| now.saturating_duration_since(t) < horizon)
        });
        let remaining = self.clients.len();
        metrics::record_tracked_clients(remaining);

        let removed = before.saturating_sub(remaining);
        tracing::debug!(removed, remaining, "Abuse control sweep finished");
        removed
    }

    /// Start the periodic sweep. Calling it again replaces the running task.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                let interval = match weak.upgrade() {
                    Some(control) => control.policy.load().sweep_interval(),
                    None => break,
                };
                tokio::time::sleep(interval).await;
                match weak.upgrade() {
                    Some(control) => {
                        control.sweep(Instant::now());
                    }
                    None => break,
                }
            }
        });

        let previous = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop the periodic sweep task.
    pub fn shutdown(&self) {
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::info!("Abuse control sweeper stopped");
        }
    }

    /// Swap in a new policy. Existing client history is kept.
    pub fn update_policy(&self, policy: RateLimitConfig) {
        tracing::info!(
            enabled = policy.enabled,
            cooldown_ms = policy.cooldown_ms,
            max_requests_per_window = policy.max_requests_per_window,
            window_ms = policy.window_ms,
            "Admission policy updated"
        );
        self.policy.store(Arc::new(policy));
    }

    pub fn policy(&self) -> Arc<RateLimitConfig> {
        self.policy.load_full()
    }

    pub fn reporter(&self) -> &AuditReporter {
        &self.reporter
    }

    /// Number of client records currently held.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

impl Drop for AbuseControl {
    fn drop(&mut self) {
        self.shutdown();
    }
}
