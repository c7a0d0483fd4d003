//! Integration tests for the stale-session guard: retired session ids must be
//! turned away with 410 Gone before the request reaches any route.

mod common;

use serde_json::Value;

use common::spawn_app;
use mem0_mcp::guard::KNOWN_STALE_SESSION;

#[tokio::test]
async fn test_stale_session_rejected_with_410() {
    let (base, _store) = spawn_app().await;

    let response = reqwest::Client::new()
        .post(format!("{base}/messages/?session_id={KNOWN_STALE_SESSION}"))
        .body(r#"{"jsonrpc": "2.0", "id": 1, "method": "ping"}"#)
        .send()
        .await
        .expect("post message");

    assert_eq!(response.status(), reqwest::StatusCode::GONE);
    assert_eq!(response.headers()["x-session-expired"], "true");
    assert_eq!(response.headers()["x-reconnect-required"], "true");
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["error"], "session_expired");
    assert_eq!(body["session_id"], KNOWN_STALE_SESSION);
    assert_eq!(body["reconnect_url"], "/sse");
    assert!(body["instructions"].is_string());
}

#[tokio::test]
async fn test_guard_takes_precedence_over_session_lookup() {
    let (base, _store) = spawn_app().await;
    let client = reqwest::Client::new();

    // An unknown id reaches the transport and gets the 404 treatment.
    let unknown = client
        .post(format!("{base}/messages/?session_id=11111111-2222-3333-4444-555555555555"))
        .body("{}")
        .send()
        .await
        .expect("post message");
    assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = unknown.json().await.expect("json body");
    assert_eq!(body["error"], "session_not_found");

    // The retired id is equally unknown to the transport, but the guard
    // answers first.
    let stale = client
        .post(format!("{base}/messages/?session_id={KNOWN_STALE_SESSION}"))
        .body("{}")
        .send()
        .await
        .expect("post message");
    assert_eq!(stale.status(), reqwest::StatusCode::GONE);
    let body: Value = stale.json().await.expect("json body");
    assert_eq!(body["error"], "session_expired");
}

#[tokio::test]
async fn test_guard_runs_before_route_matching() {
    let (base, _store) = spawn_app().await;

    // /messages/ only routes POST; the guard still intercepts a stale GET
    // before the router can answer 405.
    let response = reqwest::get(format!("{base}/messages/?session_id={KNOWN_STALE_SESSION}"))
        .await
        .expect("get message endpoint");
    assert_eq!(response.status(), reqwest::StatusCode::GONE);
}

#[tokio::test]
async fn test_guard_ignores_other_paths() {
    let (base, _store) = spawn_app().await;

    let response = reqwest::get(format!("{base}/health?session_id={KNOWN_STALE_SESSION}"))
        .await
        .expect("get /health");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["status"], "healthy");
}
