//! HTTP server assembly: shared state, route handlers, and the serve loop.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::backend::MemoryBackend;
use crate::config::Config;
use crate::guard::stale_session_guard;
use crate::registry::ToolRegistry;
use crate::tools::{build_registry, MemoryTools};
use crate::transport::{MessageRouter, SessionTransport};

/// Interval between keep-alive comments on idle streams.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

// ============================================================================
// Shared state
// ============================================================================

/// Everything the handlers need, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub transport: SessionTransport,
    pub registry: Arc<ToolRegistry>,
}

impl AppState {
    /// Wire the tool set, registry, and transport for the given backend.
    pub fn new(config: Config, backend: Arc<dyn MemoryBackend>) -> Self {
        let tools = Arc::new(MemoryTools::new(backend, &config.default_user_id));
        let registry = Arc::new(build_registry(tools, config.advanced_tools_enabled()));
        let transport =
            SessionTransport::new(MessageRouter::new(registry.clone(), &config.server_name));
        AppState {
            config: Arc::new(config),
            transport,
            registry,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /sse: open a session and stream responses to the client.
///
/// The first event names the endpoint the client must POST messages to; every
/// response after that arrives as a `message` event on this stream.
async fn sse_handler(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Response> {
    let handle = match state.transport.open_session().await {
        Ok(handle) => handle,
        Err(err) => {
            error!(error = %err, "could not open session");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "session_allocation_failed",
                    "message": err.to_string(),
                })),
            )
                .into_response());
        }
    };

    info!(session_id = %handle.id, "SSE stream established");

    let endpoint_event = Event::default()
        .event("endpoint")
        .data(handle.endpoint.clone());
    let first = stream::once(std::future::ready(Ok::<Event, Infallible>(endpoint_event)));

    // The receiver doubles as the liveness token: when the client disconnects
    // the stream is dropped, the worker sees the closed channel, and the
    // session is removed.
    let responses = stream::unfold(handle.outbound, |mut outbound| async move {
        outbound
            .recv()
            .await
            .map(|payload| (Ok(Event::default().event("message").data(payload)), outbound))
    });

    Ok(Sse::new(first.chain(responses)).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("ping"),
    ))
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    session_id: Option<String>,
}

/// POST /messages/?session_id=<id>: queue one message for the session.
/// Accepted submissions are answered 202 immediately; the JSON-RPC response
/// arrives later on the session's event stream.
async fn messages_handler(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    let Some(session_id) = query.session_id.filter(|id| !id.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "missing_session_id",
                "message": "session_id query parameter is required",
            })),
        )
            .into_response();
    };

    match state.transport.dispatch(&session_id, body).await {
        Ok(()) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Err(err) => {
            warn!(session_id = %session_id, error = %err, "message for unavailable session");
            session_not_found_response()
        }
    }
}

/// 404 with reconnect guidance, sent for ids with no live session.
fn session_not_found_response() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "session_not_found",
            "message": "Session has expired or was not found. Please reconnect to /sse endpoint.",
            "reconnect_url": "/sse",
            "instructions": [
                "1. Close any existing SSE connections",
                "2. Connect to /sse endpoint",
                "3. Wait for 'endpoint' event with new session URL",
                "4. Use the new session URL for subsequent requests"
            ]
        })),
    )
        .into_response()
}

/// GET / and GET /health: liveness probe.
async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": state.config.server_name,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// GET /debug/sse: connection walkthrough for humans wiring up clients.
async fn debug_sse_handler(State(state): State<AppState>) -> Json<Value> {
    let active_sessions = state.transport.session_count().await;
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "sse_endpoint": "/sse",
        "messages_endpoint": "/messages/",
        "active_sessions": active_sessions,
        "instructions": {
            "1": "Connect to /sse using EventSource or SSE client",
            "2": "Server will send 'endpoint' event with session URL",
            "3": "Use that URL for subsequent POST requests to /messages/"
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

// ============================================================================
// Router and serve loop
// ============================================================================

/// Assemble the router. The stale-session guard wraps everything so retired
/// session ids are turned away before route matching; CORS sits inside it.
pub fn build_router(state: AppState) -> Router {
    let enable_cors = state.config.enable_cors;

    let mut router = Router::new()
        .route("/sse", get(sse_handler))
        .route("/messages/", post(messages_handler))
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/debug/sse", get(debug_sse_handler))
        .with_state(state);

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
        .layer(middleware::from_fn(stale_session_guard))
        .layer(TraceLayer::new_for_http())
}

/// Bind and run until a shutdown signal arrives, then close every session.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening");

    let transport = state.transport.clone();
    let app = build_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    transport.close_all().await;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => error!(error = %err, "failed to listen for shutdown signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutil::InMemoryBackend;

    fn test_state() -> AppState {
        let config = Config {
            mem0_api_key: Some("test-key".to_string()),
            ..Config::default()
        };
        AppState::new(config, Arc::new(InMemoryBackend::default()))
    }

    #[tokio::test]
    async fn test_health_handler_shape() {
        let Json(body) = health_handler(State(test_state())).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "mem0-mcp");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_debug_handler_shape() {
        let Json(body) = debug_sse_handler(State(test_state())).await;
        assert_eq!(body["sse_endpoint"], "/sse");
        assert_eq!(body["messages_endpoint"], "/messages/");
        assert_eq!(body["active_sessions"], 0);
        assert!(body["instructions"]["1"].is_string());
    }

    #[tokio::test]
    async fn test_messages_handler_requires_session_id() {
        let response = messages_handler(
            State(test_state()),
            Query(MessageQuery { session_id: None }),
            "{}".to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_messages_handler_rejects_unknown_session() {
        let response = messages_handler(
            State(test_state()),
            Query(MessageQuery {
                session_id: Some("no-such-id".to_string()),
            }),
            "{}".to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "session_not_found");
        assert_eq!(body["reconnect_url"], "/sse");
    }

    #[tokio::test]
    async fn test_registry_size_follows_config() {
        let basic = AppState::new(
            Config {
                mem0_api_key: Some("test-key".to_string()),
                mode: "basic".to_string(),
                enable_advanced_tools: false,
                ..Config::default()
            },
            Arc::new(InMemoryBackend::default()),
        );
        assert_eq!(basic.registry.len(), 3);

        let full = test_state();
        assert_eq!(full.registry.len(), 7);
    }
}
