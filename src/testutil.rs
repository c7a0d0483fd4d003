//! In-memory backends for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::backend::{MemoryBackend, MemoryRecord};
use crate::error::BackendError;

/// Backend that stores memories per user in a map. Search is a lowercase
/// substring match, which is enough to exercise the tool layer.
#[derive(Default)]
pub struct InMemoryBackend {
    store: Mutex<HashMap<String, Vec<MemoryRecord>>>,
}

impl InMemoryBackend {
    pub async fn record_count(&self, user_id: &str) -> usize {
        self.store
            .lock()
            .await
            .get(user_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    async fn add(
        &self,
        content: &str,
        user_id: &str,
        metadata: Option<Value>,
    ) -> Result<Option<String>, BackendError> {
        if content.trim().is_empty() {
            return Err(BackendError::invalid_input("memory content must not be empty"));
        }
        let mut store = self.store.lock().await;
        let records = store.entry(user_id.to_string()).or_default();
        let id = format!("mem-{}", records.len() + 1);
        records.push(MemoryRecord {
            id: id.clone(),
            memory: content.to_string(),
            metadata,
            created_at: Some("2025-01-01T00:00:00Z".to_string()),
        });
        Ok(Some(id))
    }

    async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<MemoryRecord>, BackendError> {
        if query.trim().is_empty() {
            return Err(BackendError::invalid_input("search query must not be empty"));
        }
        let store = self.store.lock().await;
        let needle = query.to_lowercase();
        let mut hits: Vec<MemoryRecord> = store
            .get(user_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| record.memory.to_lowercase().contains(&needle))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(limit) = limit {
            hits.truncate(limit as usize);
        }
        Ok(hits)
    }

    async fn list_all(
        &self,
        user_id: &str,
        _page: u32,
        page_size: u32,
    ) -> Result<Vec<MemoryRecord>, BackendError> {
        let store = self.store.lock().await;
        let mut records = store.get(user_id).cloned().unwrap_or_default();
        records.truncate(page_size as usize);
        Ok(records)
    }

    async fn update(
        &self,
        memory_id: &str,
        new_content: &str,
        user_id: &str,
    ) -> Result<(), BackendError> {
        let mut store = self.store.lock().await;
        let record = store
            .get_mut(user_id)
            .and_then(|records| records.iter_mut().find(|record| record.id == memory_id));
        match record {
            Some(record) => {
                record.memory = new_content.to_string();
                Ok(())
            }
            None => Err(BackendError::api(404, "memory not found")),
        }
    }

    async fn delete(&self, memory_id: &str, user_id: &str) -> Result<(), BackendError> {
        let mut store = self.store.lock().await;
        let Some(records) = store.get_mut(user_id) else {
            return Err(BackendError::api(404, "memory not found"));
        };
        match records.iter().position(|record| record.id == memory_id) {
            Some(index) => {
                records.remove(index);
                Ok(())
            }
            None => Err(BackendError::api(404, "memory not found")),
        }
    }

    async fn set_project_instructions(&self, _instructions: &str) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Backend whose every operation fails with a 503.
pub struct FailingBackend;

impl FailingBackend {
    fn unavailable() -> BackendError {
        BackendError::api(503, "unavailable")
    }
}

#[async_trait]
impl MemoryBackend for FailingBackend {
    async fn add(
        &self,
        _content: &str,
        _user_id: &str,
        _metadata: Option<Value>,
    ) -> Result<Option<String>, BackendError> {
        Err(Self::unavailable())
    }

    async fn search(
        &self,
        _query: &str,
        _user_id: &str,
        _limit: Option<u32>,
    ) -> Result<Vec<MemoryRecord>, BackendError> {
        Err(Self::unavailable())
    }

    async fn list_all(
        &self,
        _user_id: &str,
        _page: u32,
        _page_size: u32,
    ) -> Result<Vec<MemoryRecord>, BackendError> {
        Err(Self::unavailable())
    }

    async fn update(
        &self,
        _memory_id: &str,
        _new_content: &str,
        _user_id: &str,
    ) -> Result<(), BackendError> {
        Err(Self::unavailable())
    }

    async fn delete(&self, _memory_id: &str, _user_id: &str) -> Result<(), BackendError> {
        Err(Self::unavailable())
    }

    async fn set_project_instructions(&self, _instructions: &str) -> Result<(), BackendError> {
        Err(Self::unavailable())
    }
}
