//! Memory backend abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BackendError;

/// A single stored memory as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Backend-assigned identifier.
    #[serde(default)]
    pub id: String,
    /// The remembered text.
    #[serde(default)]
    pub memory: String,
    /// Arbitrary metadata attached at add time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Creation timestamp as reported by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Storage backend for memories.
///
/// The production implementation is [`crate::mem0::Mem0Client`]. Tests use an
/// in-memory substitute so tool behavior can be checked without a network.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Store `content` for `user_id`, optionally with metadata. Returns the
    /// id of the created memory when the backend reports one.
    async fn add(
        &self,
        content: &str,
        user_id: &str,
        metadata: Option<Value>,
    ) -> Result<Option<String>, BackendError>;

    /// Semantic search over the user's memories.
    async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<MemoryRecord>, BackendError>;

    /// Page through memories stored for the user.
    async fn list_all(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<MemoryRecord>, BackendError>;

    /// Replace the text of one of the user's memories.
    async fn update(
        &self,
        memory_id: &str,
        new_content: &str,
        user_id: &str,
    ) -> Result<(), BackendError>;

    /// Delete one of the user's memories by id.
    async fn delete(&self, memory_id: &str, user_id: &str) -> Result<(), BackendError>;

    /// Upload project-level extraction instructions.
    async fn set_project_instructions(&self, instructions: &str) -> Result<(), BackendError>;
}
