//! Streaming memory MCP server backed by the mem0 API.
//!
//! Clients connect over SSE, receive a per-session message endpoint, and
//! drive the JSON-RPC tool protocol through it: submissions are POSTed,
//! responses arrive asynchronously on the event stream. Memory storage is
//! behind the [`backend::MemoryBackend`] trait, implemented for the mem0
//! REST API with retrying behavior.

pub mod backend;
pub mod categories;
pub mod chatwise;
pub mod config;
pub mod error;
pub mod guard;
pub mod mem0;
pub mod params;
pub mod registry;
pub mod retry;
pub mod rpc;
pub mod server;
pub mod tools;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use backend::{MemoryBackend, MemoryRecord};
pub use config::Config;
pub use error::BackendError;
pub use mem0::Mem0Client;
pub use server::AppState;
