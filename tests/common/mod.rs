//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use abuse_gate::config::GatewayConfig;
use abuse_gate::http::HttpServer;
use abuse_gate::lifecycle::Shutdown;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Messages received by a mock Bot API.
pub type Inbox = Arc<Mutex<Vec<Value>>>;

#[derive(Clone)]
struct WebhookState {
    inbox: Inbox,
    healthy: bool,
}

async fn send_message(
    State(state): State<WebhookState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.inbox.lock().unwrap().push(body);
    if state.healthy {
        (StatusCode::OK, Json(json!({ "ok": true, "result": {} })))
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "description": "Internal Server Error" })),
        )
    }
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Start a mock Telegram Bot API. `healthy = false` answers every message with 500.
pub async fn start_mock_webhook(healthy: bool) -> (SocketAddr, Inbox) {
    let inbox = Inbox::default();
    let state = WebhookState {
        inbox: inbox.clone(),
        healthy,
    };
    let router = Router::new()
        .route("/{*path}", post(send_message))
        .with_state(state);
    (serve(router).await, inbox)
}

/// Start a mock OpenAI-compatible completion API that always answers.
pub async fn start_mock_completion() -> SocketAddr {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|Json(body): Json<Value>| async move {
            let user = body["messages"][1]["content"].as_str().unwrap_or("").to_string();
            Json(json!({
                "choices": [{ "message": { "role": "assistant", "content": format!("echo: {user}") } }],
                "usage": { "total_tokens": 42 }
            }))
        }),
    );
    serve(router).await
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Gate config pointing at the given mocks.
pub fn config(webhook: Option<SocketAddr>, completion: Option<SocketAddr>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    match webhook {
        Some(addr) => {
            config.alerts.api_base = format!("http://{addr}");
            config.alerts.bot_token = Some("123:test".into());
            config.alerts.chat_id = Some("42".into());
            config.alerts.timeout_ms = 2_000;
        }
        None => config.alerts.enabled = false,
    }
    if let Some(addr) = completion {
        config.completion.base_url = format!("http://{addr}/v1");
        config.completion.api_key = Some("test-key".into());
    }
    config
}

/// Start the gate on an ephemeral port.
pub async fn start_gate(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (_, config_updates) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Wait until some message text in `inbox` contains `needle`.
#[allow(dead_code)]
pub async fn wait_for_message(inbox: &Inbox, needle: &str) -> bool {
    for _ in 0..100 {
        let found = inbox
            .lock()
            .unwrap()
            .iter()
            .any(|m| m["text"].as_str().is_some_and(|t| t.contains(needle)));
        if found {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
