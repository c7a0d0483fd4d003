//! Shared fixtures for the integration tests: an in-process stand-in for the
//! mem0 REST API plus a helper that boots the full server on an ephemeral
//! port, wired to a fresh stub.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Query;
use axum::routing::{patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::timeout;

use mem0_mcp::retry::RetryPolicy;
use mem0_mcp::server::{build_router, AppState};
use mem0_mcp::{Config, Mem0Client};

/// Memories recorded by the stub backend, as `(user_id, content)` pairs.
pub type StubStore = Arc<Mutex<Vec<(String, String)>>>;

#[derive(Deserialize)]
struct ListQuery {
    user_id: String,
}

// ============================================================================
// Stub backend
// ============================================================================

/// In-process stand-in for the mem0 REST API.
///
/// Stores memories in a shared vector and answers searches with a
/// case-insensitive substring match, which is all the tests need.
pub fn stub_backend(store: StubStore) -> Router {
    Router::new()
        .route(
            "/v1/memories/",
            post({
                let store = store.clone();
                move |Json(body): Json<Value>| {
                    let store = store.clone();
                    async move {
                        let content = body["messages"][0]["content"]
                            .as_str()
                            .unwrap_or_default()
                            .to_string();
                        let user_id = body["user_id"].as_str().unwrap_or_default().to_string();
                        let mut entries = store.lock().await;
                        entries.push((user_id, content.clone()));
                        let id = format!("mem-{}", entries.len());
                        Json(json!({"results": [{"id": id, "memory": content, "event": "ADD"}]}))
                    }
                }
            })
            .get({
                let store = store.clone();
                move |Query(query): Query<ListQuery>| {
                    let store = store.clone();
                    async move {
                        let entries = store.lock().await;
                        let results: Vec<Value> = entries
                            .iter()
                            .enumerate()
                            .filter(|(_, (user_id, _))| *user_id == query.user_id)
                            .map(|(index, (_, content))| {
                                json!({"id": format!("mem-{}", index + 1), "memory": content})
                            })
                            .collect();
                        Json(json!({"results": results}))
                    }
                }
            }),
        )
        .route(
            "/v1/memories/search/",
            post({
                let store = store.clone();
                move |Json(body): Json<Value>| {
                    let store = store.clone();
                    async move {
                        let needle = body["query"].as_str().unwrap_or_default().to_lowercase();
                        let user_id = body["user_id"].as_str().unwrap_or_default().to_string();
                        let entries = store.lock().await;
                        let results: Vec<Value> = entries
                            .iter()
                            .enumerate()
                            .filter(|(_, (user, content))| {
                                *user == user_id && content.to_lowercase().contains(&needle)
                            })
                            .map(|(index, (_, content))| {
                                json!({"id": format!("mem-{}", index + 1), "memory": content})
                            })
                            .collect();
                        Json(json!({"results": results}))
                    }
                }
            }),
        )
        .route(
            "/v1/project/",
            patch(|| async { Json(json!({"message": "Updated custom instructions"})) }),
        )
}

// ============================================================================
// Server bootstrap
// ============================================================================

/// Boot the full server wired to a fresh stub backend. Returns the server
/// base URL and the stub's memory store.
pub async fn spawn_app() -> (String, StubStore) {
    let config = Config {
        mem0_api_key: Some("test-key".to_string()),
        ..Config::default()
    };
    spawn_app_with(config).await
}

/// Like [`spawn_app`] but with caller-controlled configuration. The backend
/// URL is always rewritten to point at the stub.
pub async fn spawn_app_with(mut config: Config) -> (String, StubStore) {
    let store: StubStore = Arc::new(Mutex::new(Vec::new()));
    let stub_addr = spawn_router(stub_backend(store.clone())).await;

    config.mem0_base_url = format!("http://{stub_addr}");
    let backend = Mem0Client::new(&config.mem0_base_url, "test-key")
        .with_retry_policy(RetryPolicy::instant());
    let state = AppState::new(config, Arc::new(backend));

    let addr = spawn_router(build_router(state)).await;
    (format!("http://{addr}"), store)
}

/// Serve a router on an ephemeral local port and return its address.
pub async fn spawn_router(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve test router");
    });
    addr
}

// ============================================================================
// SSE session client
// ============================================================================

/// Minimal SSE consumer for a connected session.
///
/// Buffers the chunked response body and yields `(event, data)` pairs,
/// skipping keep-alive comment blocks.
pub struct SseSession {
    response: reqwest::Response,
    buffer: String,
    server_base: String,
    /// Server-relative message endpoint announced at connect time.
    pub endpoint: String,
}

impl SseSession {
    /// Open a stream against `/sse` and consume the initial `endpoint` event.
    pub async fn connect(base: &str) -> Self {
        let response = reqwest::Client::new()
            .get(format!("{base}/sse"))
            .send()
            .await
            .expect("connect to /sse");
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let mut session = SseSession {
            response,
            buffer: String::new(),
            server_base: base.to_string(),
            endpoint: String::new(),
        };
        let (event, data) = session.next_event().await;
        assert_eq!(event, "endpoint");
        session.endpoint = data;
        session
    }

    /// Post a raw body to this session's message endpoint.
    pub async fn post_raw(&self, body: impl Into<String>) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}{}", self.server_base, self.endpoint))
            .body(body.into())
            .send()
            .await
            .expect("post message")
    }

    /// Post a JSON-RPC request and wait for the correlated response event.
    pub async fn call(&mut self, request: Value) -> Value {
        let response = self.post_raw(request.to_string()).await;
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
        self.next_message().await
    }

    /// Next `message` event payload, parsed as JSON.
    pub async fn next_message(&mut self) -> Value {
        let (event, data) = self.next_event().await;
        assert_eq!(event, "message");
        serde_json::from_str(&data).expect("message payload is JSON")
    }

    /// Next named event as `(event, data)`.
    pub async fn next_event(&mut self) -> (String, String) {
        loop {
            if let Some(parsed) = self.take_buffered_event() {
                return parsed;
            }
            let chunk = timeout(Duration::from_secs(5), self.response.chunk())
                .await
                .expect("timed out waiting for an SSE event")
                .expect("SSE stream error")
                .expect("SSE stream ended");
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    fn take_buffered_event(&mut self) -> Option<(String, String)> {
        while let Some(end) = self.buffer.find("\n\n") {
            let block = self.buffer[..end].to_string();
            self.buffer.drain(..end + 2);

            let mut event = String::new();
            let mut data = String::new();
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    event = value.strip_prefix(' ').unwrap_or(value).to_string();
                } else if let Some(value) = line.strip_prefix("data:") {
                    let value = value.strip_prefix(' ').unwrap_or(value);
                    if !data.is_empty() {
                        data.push('\n');
                    }
                    data.push_str(value);
                }
            }
            if event.is_empty() && data.is_empty() {
                // Comment-only block, e.g. a keep-alive ping.
                continue;
            }
            return Some((event, data));
        }
        None
    }
}
