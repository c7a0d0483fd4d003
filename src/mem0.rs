//! REST client for the mem0 memory API.
//!
//! Endpoints follow the mem0 v1 surface: memories are added and searched with
//! POST requests, listed with GET, and maintained with PUT/DELETE on the
//! per-memory path. Every call goes through the retry layer; argument
//! validation happens before the first attempt.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::backend::{MemoryBackend, MemoryRecord};
use crate::error::BackendError;
use crate::retry::{retry_with_backoff, RetryPolicy};

/// Client for the mem0 v1 REST API.
#[derive(Clone)]
pub struct Mem0Client {
    base_url: String,
    api_key: String,
    client: Client,
    retry: RetryPolicy,
}

impl Mem0Client {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Mem0Client {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth(&self) -> String {
        format!("Token {}", self.api_key)
    }

    /// Read a response body, mapping non-success statuses to [`BackendError::Api`].
    async fn read_json(response: reqwest::Response) -> Result<Value, BackendError> {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = if text.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                text.trim().to_string()
            };
            return Err(BackendError::api(status.as_u16(), message));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|err| BackendError::Transport(format!("invalid JSON from backend: {err}")))
    }

    /// The v1.1 output format wraps records in a `results` array; older
    /// responses return a bare array. Accept both.
    fn extract_records(value: &Value) -> Vec<MemoryRecord> {
        let items = value.get("results").unwrap_or(value);
        match items {
            Value::Array(array) => array
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl MemoryBackend for Mem0Client {
    async fn add(
        &self,
        content: &str,
        user_id: &str,
        metadata: Option<Value>,
    ) -> Result<Option<String>, BackendError> {
        if content.trim().is_empty() {
            return Err(BackendError::invalid_input("memory content must not be empty"));
        }

        let mut body = json!({
            "messages": [{"role": "user", "content": content}],
            "user_id": user_id,
            "output_format": "v1.1",
        });
        if let Some(metadata) = metadata {
            body["metadata"] = metadata;
        }

        let url = self.url("/v1/memories/");
        let value = retry_with_backoff(&self.retry, "mem0.add", || async {
            let response = self
                .client
                .post(&url)
                .header("Authorization", self.auth())
                .json(&body)
                .send()
                .await?;
            Self::read_json(response).await
        })
        .await?;

        debug!(user_id, "stored memory");
        Ok(Self::extract_records(&value)
            .into_iter()
            .next()
            .map(|record| record.id)
            .filter(|id| !id.is_empty()))
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

        let mut body = json!({
            "query": query,
            "user_id": user_id,
            "output_format": "v1.1",
        });
        if let Some(limit) = limit {
            body["limit"] = json!(limit);
        }

        let url = self.url("/v1/memories/search/");
        let value = retry_with_backoff(&self.retry, "mem0.search", || async {
            let response = self
                .client
                .post(&url)
                .header("Authorization", self.auth())
                .json(&body)
                .send()
                .await?;
            Self::read_json(response).await
        })
        .await?;

        Ok(Self::extract_records(&value))
    }

    async fn list_all(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<MemoryRecord>, BackendError> {
        let url = self.url("/v1/memories/");
        let page = page.to_string();
        let page_size = page_size.to_string();

        let value = retry_with_backoff(&self.retry, "mem0.list_all", || async {
            let response = self
                .client
                .get(&url)
                .header("Authorization", self.auth())
                .query(&[
                    ("user_id", user_id),
                    ("page", page.as_str()),
                    ("page_size", page_size.as_str()),
                ])
                .send()
                .await?;
            Self::read_json(response).await
        })
        .await?;

        Ok(Self::extract_records(&value))
    }

    async fn update(
        &self,
        memory_id: &str,
        new_content: &str,
        user_id: &str,
    ) -> Result<(), BackendError> {
        if memory_id.trim().is_empty() {
            return Err(BackendError::invalid_input("memory id must not be empty"));
        }
        if new_content.trim().is_empty() {
            return Err(BackendError::invalid_input("replacement content must not be empty"));
        }

        let url = self.url(&format!("/v1/memories/{memory_id}/"));
        let body = json!({"text": new_content, "user_id": user_id});

        retry_with_backoff(&self.retry, "mem0.update", || async {
            let response = self
                .client
                .put(&url)
                .header("Authorization", self.auth())
                .json(&body)
                .send()
                .await?;
            Self::read_json(response).await
        })
        .await?;

        Ok(())
    }

    async fn delete(&self, memory_id: &str, user_id: &str) -> Result<(), BackendError> {
        if memory_id.trim().is_empty() {
            return Err(BackendError::invalid_input("memory id must not be empty"));
        }

        let url = self.url(&format!("/v1/memories/{memory_id}/"));

        retry_with_backoff(&self.retry, "mem0.delete", || async {
            let response = self
                .client
                .delete(&url)
                .header("Authorization", self.auth())
                .query(&[("user_id", user_id)])
                .send()
                .await?;
            Self::read_json(response).await
        })
        .await?;

        Ok(())
    }

    async fn set_project_instructions(&self, instructions: &str) -> Result<(), BackendError> {
        let url = self.url("/v1/project/");
        let body = json!({"custom_instructions": instructions});

        retry_with_backoff(&self.retry, "mem0.set_project_instructions", || async {
            let response = self
                .client
                .patch(&url)
                .header("Authorization", self.auth())
                .json(&body)
                .send()
                .await?;
            Self::read_json(response).await
        })
        .await?;

        Ok(())
    }
}
