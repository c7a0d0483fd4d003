//! Stale-session interception.
//!
//! Some clients cache a session URL across server restarts and keep POSTing
//! to it forever. Requests addressing the known-stale id are answered with
//! 410 Gone and explicit reconnect guidance before any routing happens, so
//! they never reach the transport.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

/// Session id retired for good; requests carrying it are turned away.
pub const KNOWN_STALE_SESSION: &str = "467db479-421a-41d2-9ff4-a7ad29678bb6";

/// Middleware run ahead of the router. Only message submissions carry session
/// ids, so other paths pass straight through.
pub async fn stale_session_guard(request: Request, next: Next) -> Response {
    if request.uri().path().starts_with("/messages") {
        if let Some(session_id) = session_id_from_query(request.uri().query()) {
            if session_id == KNOWN_STALE_SESSION {
                warn!(session_id = %session_id, "rejected request for retired session");
                return stale_session_response(&session_id);
            }
        }
    }
    next.run(request).await
}

/// Pull the `session_id` value out of a raw query string.
pub fn session_id_from_query(query: Option<&str>) -> Option<String> {
    let query = query?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "session_id" && !value.is_empty()).then(|| value.to_string())
    })
}

/// 410 Gone with reconnect guidance. Carries CORS and marker headers directly
/// since it short-circuits the middleware stack.
pub fn stale_session_response(session_id: &str) -> Response {
    (
        StatusCode::GONE,
        [
            ("access-control-allow-origin", "*"),
            ("x-session-expired", "true"),
            ("x-reconnect-required", "true"),
        ],
        Json(json!({
            "error": "session_expired",
            "message": "Session has expired. Please reconnect to /sse endpoint.",
            "session_id": session_id,
            "reconnect_url": "/sse",
            "instructions": "Connect to /sse to establish a new session"
        })),
    )
        .into_response()
}
