//! Fire-and-forget alert reporting.
//!
//! [`AuditReporter`] renders alerts on the caller's task and hands the text
//! to a bounded queue. A single [`AlertWorker`] drains the queue and
//! delivers each message under a timeout. Nothing in here can fail the
//! caller: a full queue, a dead webhook or a timeout only produce a log line.

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Offset as _, Utc};
use tokio::sync::{broadcast, mpsc};

use crate::alerts::message::{Alert, EventKind, ReportStatus, RequestMeta};
use crate::alerts::notifier::{Notifier, NotifyError};
use crate::config::AlertConfig;
use crate::observability::metrics;

struct Delivery {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
    queue: mpsc::Sender<String>,
}

/// Handle used by the admission gate and endpoint handlers to raise alerts.
#[derive(Clone)]
pub struct AuditReporter {
    delivery: Option<Arc<Delivery>>,
    offset: FixedOffset,
}

impl AuditReporter {
    /// Create a reporter and the worker that delivers its alerts.
    ///
    /// The worker must be started with [`AlertWorker::run`].
    pub fn new(notifier: Arc<dyn Notifier>, config: &AlertConfig) -> (Self, AlertWorker) {
        let (queue, rx) = mpsc::channel(config.queue_capacity.max(1));
        let timeout = config.timeout();
        let delivery = Arc::new(Delivery {
            notifier: notifier.clone(),
            timeout,
            queue,
        });

        let reporter = Self {
            delivery: Some(delivery),
            offset: utc_offset(config.utc_offset_hours),
        };
        let worker = AlertWorker { rx, notifier, timeout };
        (reporter, worker)
    }

    /// A reporter that drops every alert.
    pub fn disabled() -> Self {
        Self {
            delivery: None,
            offset: utc_offset(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.delivery.is_some()
    }

    /// Queue an alert for background delivery. Never blocks, never fails.
    pub fn notify(&self, alert: Alert) {
        let Some(delivery) = &self.delivery else {
            metrics::record_alert("disabled");
            return;
        };

        let text = alert.render(Utc::now().with_timezone(&self.offset));
        match delivery.queue.try_send(text) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::record_alert("dropped");
                tracing::warn!(kind = ?alert.kind, "Alert queue full, dropping alert");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                metrics::record_alert("dropped");
                tracing::debug!(kind = ?alert.kind, "Alert worker stopped, dropping alert");
            }
        }
    }

    /// Report on a handler's own progress.
    ///
    /// `params` values are stringified and truncated when rendered; `error`
    /// is only shown for [`ReportStatus::Error`].
    pub fn report<I, K, V>(
        &self,
        endpoint: &str,
        meta: &RequestMeta,
        params: I,
        status: ReportStatus,
        error: Option<&str>,
    ) where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let mut alert = Alert::new(EventKind::from(status), endpoint, meta.clone()).with_params(params);
        if let Some(error) = error {
            alert = alert.with_error(error);
        }
        self.notify(alert);
    }

    /// Deliver `text` right away and wait for the outcome.
    ///
    /// Used by the status probe; regular alerts go through [`Self::notify`].
    pub async fn send_now(&self, text: &str) -> Result<(), NotifyError> {
        let Some(delivery) = &self.delivery else {
            return Err(NotifyError::Disabled);
        };
        deliver(delivery.notifier.as_ref(), text, delivery.timeout).await
    }

    /// Current time in the alert timezone.
    pub fn local_now(&self) -> chrono::DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Background task draining the alert queue.
pub struct AlertWorker {
    rx: mpsc::Receiver<String>,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl AlertWorker {
    /// Deliver alerts until shutdown, then flush what is already queued.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Alert worker starting");
        loop {
            tokio::select! {
                next = self.rx.recv() => match next {
                    Some(text) => {
                        let _ = deliver(self.notifier.as_ref(), &text, self.timeout).await;
                    }
                    None => break,
                },
                _ = shutdown.recv() => {
                    self.rx.close();
                    while let Some(text) = self.rx.recv().await {
                        let _ = deliver(self.notifier.as_ref(), &text, self.timeout).await;
                    }
                    break;
                }
            }
        }
        tracing::info!("Alert worker stopped");
    }
}

async fn deliver(notifier: &dyn Notifier, text: &str, timeout: Duration) -> Result<(), NotifyError> {
    let result = match tokio::time::timeout(timeout, notifier.send(text)).await {
        Ok(result) => result,
        Err(_) => Err(NotifyError::Timeout(timeout)),
    };

    match &result {
        Ok(()) => {
            metrics::record_alert("sent");
            tracing::debug!("Alert delivered");
        }
        Err(e) => {
            metrics::record_alert("failed");
            tracing::warn!(error = %e, "Alert delivery failed");
        }
    }
    result
}

fn utc_offset(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours.clamp(-23, 23) * 3600).unwrap_or_else(|| Utc.fix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use async_trait::async_trait;
    use crate::lifecycle::Shutdown;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for Recording {
        async fn send(&self, text: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        async fn send(&self, _text: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Rejected("chat not found".into()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl Notifier for Hanging {
        async fn send(&self, _text: &str) -> Result<(), NotifyError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn config() -> AlertConfig {
        AlertConfig {
            timeout_ms: 50,
            queue_capacity: 2,
            ..AlertConfig::default()
        }
    }

    fn meta() -> RequestMeta {
        RequestMeta {
            method: "GET".into(),
            path: "/api/ai/chat".into(),
            client_id: "9.9.9.9".into(),
            user_agent: "curl/8.0".into(),
        }
    }

    #[tokio::test]
    async fn test_report_is_delivered() {
        let notifier = Arc::new(Recording::default());
        let (reporter, worker) = AuditReporter::new(notifier.clone(), &config());
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(worker.run(shutdown.subscribe()));

        reporter.report("/api/ai/chat", &meta(), [("text", "hello")], ReportStatus::Success, None);

        shutdown.trigger();
        handle.await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("<code>hello</code>"));
        assert!(sent[0].contains("<code>9.9.9.9</code>"));
    }

    #[tokio::test]
    async fn test_failing_notifier_never_reaches_caller() {
        let (reporter, worker) = AuditReporter::new(Arc::new(Failing), &config());
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(worker.run(shutdown.subscribe()));

        reporter.report(
            "/api/ai/chat",
            &meta(),
            Vec::<(String, String)>::new(),
            ReportStatus::Error,
            Some("upstream exploded"),
        );
        assert!(matches!(
            reporter.send_now("probe").await,
            Err(NotifyError::Rejected(_))
        ));

        shutdown.trigger();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_hanging_notifier_times_out() {
        let (reporter, _worker) = AuditReporter::new(Arc::new(Hanging), &config());
        let result = reporter.send_now("probe").await;
        assert!(matches!(result, Err(NotifyError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        // Worker never started: the queue fills after two alerts.
        let (reporter, _worker) = AuditReporter::new(Arc::new(Recording::default()), &config());
        for _ in 0..10 {
            reporter.notify(Alert::new(EventKind::Blocked, "/x", meta()));
        }
    }

    #[tokio::test]
    async fn test_disabled_reporter() {
        let reporter = AuditReporter::disabled();
        assert!(!reporter.is_enabled());
        reporter.notify(Alert::new(EventKind::Success, "/x", meta()));
        assert!(matches!(reporter.send_now("probe").await, Err(NotifyError::Disabled)));
    }
}
