//! SSE session transport.
//!
//! Each connected client gets a session: an id, an inbound queue for message
//! submissions, and an outbound queue drained by the client's event stream.
//! A dedicated worker task per session pulls submissions, runs them through
//! the message router, and pushes responses outbound. Dropping the stream
//! receiver is the disconnect signal; the worker notices and removes the
//! session from the registry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{DispatchError, SessionIdExhausted};
use crate::registry::ToolRegistry;
use crate::rpc::{parse_request, RpcError, RpcResponse};

/// Attempts at drawing an unused session id before giving up.
const MAX_ID_ATTEMPTS: usize = 8;
/// Queue depth for client submissions awaiting the worker.
const INBOUND_QUEUE_DEPTH: usize = 64;
/// Queue depth for responses awaiting stream delivery.
const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Protocol version reported during the initialize handshake.
const PROTOCOL_VERSION: &str = "2024-11-05";

// ============================================================================
// Message router
// ============================================================================

/// Routes decoded requests to protocol handlers or registered tools.
pub struct MessageRouter {
    registry: Arc<ToolRegistry>,
    server_name: String,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl MessageRouter {
    pub fn new(registry: Arc<ToolRegistry>, server_name: impl Into<String>) -> Self {
        MessageRouter {
            registry,
            server_name: server_name.into(),
        }
    }

    /// Handle one raw message. Returns `None` for notifications, which never
    /// get a response.
    pub async fn handle(&self, raw: &str) -> Option<RpcResponse> {
        let request = match parse_request(raw) {
            Ok(request) => request,
            Err(response) => return Some(response),
        };

        let Some(id) = request.id else {
            debug!(method = %request.method, "ignoring notification");
            return None;
        };

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({"tools": self.registry.descriptors()})),
            "tools/call" => self.call_wrapped(request.params).await,
            // Anything else is treated as a direct tool invocation.
            method => self
                .registry
                .invoke(method, request.params)
                .await
                .map(Value::String)
                .map_err(RpcError::from),
        };

        Some(match outcome {
            Ok(result) => RpcResponse::success(id, result),
            Err(error) => RpcResponse::error(id, error),
        })
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {"listChanged": false}
            },
            "serverInfo": {
                "name": self.server_name,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    /// `tools/call` wraps the tool reply in a content block.
    async fn call_wrapped(&self, params: Value) -> Result<Value, RpcError> {
        let call: ToolCallParams = serde_json::from_value(params)
            .map_err(|err| RpcError::invalid_params(format!("invalid tools/call params: {err}")))?;

        let text = self
            .registry
            .invoke(&call.name, call.arguments)
            .await
            .map_err(RpcError::from)?;

        Ok(json!({
            "content": [{"type": "text", "text": text}],
            "isError": false,
        }))
    }
}

// ============================================================================
// Session transport
// ============================================================================

/// Everything the SSE handler needs for one new session.
pub struct SessionHandle {
    pub id: String,
    /// Relative URI the client must POST messages to.
    pub endpoint: String,
    /// Serialized responses ready for stream delivery. Dropping this receiver
    /// tears the session down.
    pub outbound: mpsc::Receiver<String>,
}

struct SessionEntry {
    inbound: mpsc::Sender<String>,
    created_at: DateTime<Utc>,
}

/// Shared session registry plus the router workers run messages through.
#[derive(Clone)]
pub struct SessionTransport {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    router: Arc<MessageRouter>,
}

impl SessionTransport {
    pub fn new(router: MessageRouter) -> Self {
        SessionTransport {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            router: Arc::new(router),
        }
    }

    /// Create a session and spawn its worker.
    pub async fn open_session(&self) -> Result<SessionHandle, SessionIdExhausted> {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_DEPTH);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);

        let id = {
            let mut sessions = self.sessions.write().await;
            let mut allocated = None;
            for _ in 0..MAX_ID_ATTEMPTS {
                let candidate = Uuid::new_v4().to_string();
                if !sessions.contains_key(&candidate) {
                    sessions.insert(
                        candidate.clone(),
                        SessionEntry {
                            inbound: inbound_tx.clone(),
                            created_at: Utc::now(),
                        },
                    );
                    allocated = Some(candidate);
                    break;
                }
            }
            allocated.ok_or(SessionIdExhausted)?
        };

        info!(session_id = %id, "session opened");
        tokio::spawn(session_worker(self.clone(), id.clone(), inbound_rx, outbound_tx));

        Ok(SessionHandle {
            endpoint: format!("/messages/?session_id={id}"),
            id,
            outbound: outbound_rx,
        })
    }

    /// Queue a raw message for the session's worker.
    pub async fn dispatch(&self, session_id: &str, raw: String) -> Result<(), DispatchError> {
        let inbound = {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                Some(entry) => entry.inbound.clone(),
                None => return Err(DispatchError::SessionNotFound(session_id.to_string())),
            }
        };

        inbound
            .send(raw)
            .await
            .map_err(|_| DispatchError::SessionClosed(session_id.to_string()))
    }

    /// Remove a session from the registry. Safe to call twice; the second
    /// call is a no-op and reports `false`.
    pub async fn close_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id);
        match removed {
            Some(entry) => {
                let age = Utc::now().signed_duration_since(entry.created_at);
                info!(session_id = %session_id, age_secs = age.num_seconds(), "session closed");
                true
            }
            None => false,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Tear down every live session. Used during shutdown.
    pub async fn close_all(&self) {
        let ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        for id in ids {
            self.close_session(&id).await;
        }
    }
}

/// Per-session worker: drains the inbound queue, runs messages through the
/// router, and delivers responses outbound. Exits when the client disconnects
/// or the session is closed, then removes the registry entry.
async fn session_worker(
    transport: SessionTransport,
    session_id: String,
    mut inbound: mpsc::Receiver<String>,
    outbound: mpsc::Sender<String>,
) {
    debug!(session_id = %session_id, "session worker started");

    loop {
        tokio::select! {
            received = inbound.recv() => {
                let Some(raw) = received else {
                    // Registry entry dropped; session was closed.
                    break;
                };
                let Some(response) = transport.router.handle(&raw).await else {
                    continue;
                };
                let payload = match serde_json::to_string(&response) {
                    Ok(payload) => payload,
                    Err(err) => {
                        error!(session_id = %session_id, error = %err, "failed to serialize response");
                        continue;
                    }
                };
                if outbound.send(payload).await.is_err() {
                    debug!(session_id = %session_id, "stream gone, discarding response");
                    break;
                }
            }
            _ = outbound.closed() => {
                debug!(session_id = %session_id, "client disconnected");
                break;
            }
        }
    }

    transport.close_session(&session_id).await;
    debug!(session_id = %session_id, "session worker stopped");
}
