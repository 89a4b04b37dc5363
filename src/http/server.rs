//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the alert reporter, admission gate and completion client
//! - Create the Axum Router with guarded and unguarded routes
//! - Wire up middleware (request ID, tracing, timeout, body limit, CORS)
//! - Run background tasks (alert worker, sweeper, policy reload)
//! - Serve until the shutdown signal, then stop background work

use axum::{
    http::{header, HeaderValue, StatusCode},
    middleware,
    routing::{any, get},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::alerts::{AlertWorker, AuditReporter, Notifier, NotifyError, TelegramNotifier};
use crate::completion::{CompletionClient, CompletionError};
use crate::config::{CompletionConfig, GatewayConfig};
use crate::http::handlers::{chat, status};
use crate::security::{rate_limit_middleware, AbuseControl};

/// How long shutdown waits for queued alerts to flush.
const ALERT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors building the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build completion client: {0}")]
    Completion(#[from] CompletionError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AbuseControl>,
    pub reporter: AuditReporter,
    pub completion: Arc<CompletionClient>,
    pub completion_limits: Arc<CompletionConfig>,
}

/// HTTP server for the gate.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    gate: Arc<AbuseControl>,
    alert_worker: Option<AlertWorker>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Alerts go to Telegram when credentials are configured and are
    /// silently dropped otherwise.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let notifier = match TelegramNotifier::from_config(&config.alerts) {
            Ok(n) => Some(Arc::new(n) as Arc<dyn Notifier>),
            Err(NotifyError::Disabled) => {
                tracing::warn!("Telegram credentials missing or alerts disabled, alert delivery off");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to build Telegram notifier, alert delivery off");
                None
            }
        };
        Self::with_notifier(config, notifier)
    }

    /// Create a server delivering alerts through `notifier`.
    pub fn with_notifier(
        config: GatewayConfig,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Result<Self, ServerError> {
        let (reporter, alert_worker) = match notifier {
            Some(notifier) => {
                let (reporter, worker) = AuditReporter::new(notifier, &config.alerts);
                (reporter, Some(worker))
            }
            None => (AuditReporter::disabled(), None),
        };

        let gate = Arc::new(AbuseControl::new(config.rate_limit.clone(), reporter.clone()));
        let completion = Arc::new(CompletionClient::new(&config.completion)?);

        let state = AppState {
            gate: gate.clone(),
            reporter,
            completion,
            completion_limits: Arc::new(config.completion.clone()),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            gate,
            alert_worker,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let guarded = Router::new()
            .route(chat::ENDPOINT, any(chat::chat))
            .route_layer(middleware::from_fn_with_state(
                state.gate.clone(),
                rate_limit_middleware,
            ));

        let allow_origin = HeaderValue::from_str(&config.security.cors_allow_origin)
            .unwrap_or_else(|_| HeaderValue::from_static("*"));

        // Outermost first.
        let layers = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetResponseHeaderLayer::if_not_present(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type, Authorization"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET,OPTIONS,POST"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                allow_origin,
            ));

        Router::new()
            .route(
                status::ENDPOINT,
                get(status::status).options(|| async { StatusCode::OK }),
            )
            .merge(guarded)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(layers)
    }

    /// Run the server until `shutdown` fires.
    ///
    /// `config_updates` carries reloaded configurations; only the admission
    /// policy is applied live.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            rate_limit_enabled = self.config.rate_limit.enabled,
            alerts = self.alert_worker.is_some(),
            "HTTP server starting"
        );

        let alert_task = self
            .alert_worker
            .map(|worker| tokio::spawn(worker.run(shutdown.resubscribe())));

        self.gate.spawn_sweeper();

        let gate = self.gate.clone();
        let reload_task = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                gate.update_policy(new_config.rate_limit);
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        reload_task.abort();
        self.gate.shutdown();
        if let Some(mut task) = alert_task {
            drain_alerts(&mut task, ALERT_DRAIN_TIMEOUT).await;
        }

        served?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The admission gate shared with handlers.
    pub fn gate(&self) -> &Arc<AbuseControl> {
        &self.gate
    }
}

/// Wait for the alert worker to flush its queue; abort it past `deadline`.
///
/// Returns whether the worker finished on its own.
async fn drain_alerts(task: &mut JoinHandle<()>, deadline: Duration) -> bool {
    match tokio::time::timeout(deadline, &mut *task).await {
        Ok(_) => true,
        Err(_) => {
            task.abort();
            tracing::warn!(?deadline, "Alert worker did not drain before the deadline, aborted");
            false
        }
    }
}
