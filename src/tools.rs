//! Memory tools and their registry wiring.
//!
//! Tool methods never fail outward: backend errors are folded into the reply
//! text so the client always receives a readable answer.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use crate::backend::{MemoryBackend, MemoryRecord};
use crate::categories;
use crate::params::{
    AddMemoryParams, CheckRelevantMemoriesParams, DeleteMemoryParams, GetAllMemoriesParams,
    GetMemoryStatsParams, SearchMemoriesParams, UpdateMemoryParams,
};
use crate::registry::{parse_params, ToolRegistry};

// ============================================================================
// Tool descriptions
// ============================================================================

const ADD_MEMORY_DESCRIPTION: &str = "Add new information to your personal memory. \
    This tool stores any important information about yourself, your preferences, \
    knowledge, or anything you want me to remember.";

const SEARCH_MEMORIES_DESCRIPTION: &str = "Search through stored memories using semantic \
    search. This tool searches for relevant information and context from your memories.";

const GET_ALL_MEMORIES_DESCRIPTION: &str = "Retrieve all stored memories for the user. \
    Returns a comprehensive list of all stored information including personal details, \
    preferences, knowledge, and more.";

const UPDATE_MEMORY_DESCRIPTION: &str = "Update an existing memory with new content";

const DELETE_MEMORY_DESCRIPTION: &str = "Delete a specific memory by ID";

const GET_MEMORY_STATS_DESCRIPTION: &str = "Get statistics about stored memories";

const CHECK_RELEVANT_MEMORIES_DESCRIPTION: &str =
    "Check if there are relevant memories before answering questions";

/// Page size used when listing memories for `get_all_memories`.
const LIST_PAGE_SIZE: u32 = 50;
/// Page size used when gathering records for statistics.
const STATS_PAGE_SIZE: u32 = 100;
/// Result cap for the relevance check.
const RELEVANCE_LIMIT: u32 = 5;

// ============================================================================
// MemoryTools
// ============================================================================

/// The memory tool set, bound to a backend and a default user.
pub struct MemoryTools {
    backend: Arc<dyn MemoryBackend>,
    user_id: String,
}

impl MemoryTools {
    pub fn new(backend: Arc<dyn MemoryBackend>, user_id: impl Into<String>) -> Self {
        MemoryTools {
            backend,
            user_id: user_id.into(),
        }
    }

    /// Store new information, echoing it back on success.
    pub async fn add_memory(&self, text: &str) -> String {
        match self.backend.add(text, &self.user_id, None).await {
            Ok(_) => format!("Successfully added to memory: {text}"),
            Err(err) => format!("Error adding to memory: {err}"),
        }
    }

    /// Semantic search, answering with a JSON array of memory contents.
    pub async fn search_memories(&self, query: &str) -> String {
        match self.backend.search(query, &self.user_id, None).await {
            Ok(records) => render_contents(records),
            Err(err) => format!("Error searching memories: {err}"),
        }
    }

    /// Every stored memory as a JSON array of contents.
    pub async fn get_all_memories(&self) -> String {
        match self.backend.list_all(&self.user_id, 1, LIST_PAGE_SIZE).await {
            Ok(records) => render_contents(records),
            Err(err) => format!("Error getting memories: {err}"),
        }
    }

    pub async fn update_memory(&self, memory_id: &str, new_content: &str) -> String {
        match self.backend.update(memory_id, new_content, &self.user_id).await {
            Ok(()) => format!("Successfully updated memory {memory_id}"),
            Err(err) => format!("Error updating memory: {err}"),
        }
    }

    pub async fn delete_memory(&self, memory_id: &str) -> String {
        match self.backend.delete(memory_id, &self.user_id).await {
            Ok(()) => format!("Successfully deleted memory {memory_id}"),
            Err(err) => format!("Error deleting memory: {err}"),
        }
    }

    /// Totals plus a per-category breakdown of stored memories.
    pub async fn get_memory_stats(&self) -> String {
        match self.backend.list_all(&self.user_id, 1, STATS_PAGE_SIZE).await {
            Ok(records) => {
                let mut by_category: BTreeMap<String, u32> = BTreeMap::new();
                for record in &records {
                    let top = categories::categorize(&record.memory)
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| "other".to_string());
                    *by_category.entry(top).or_insert(0) += 1;
                }
                let stats = json!({
                    "total_memories": records.len(),
                    "memory_types": by_category,
                });
                serde_json::to_string_pretty(&stats).unwrap_or_else(|_| "{}".to_string())
            }
            Err(err) => format!("Error getting stats: {err}"),
        }
    }

    /// Quick relevance probe for a topic, capped at five results.
    pub async fn check_relevant_memories(&self, topic: &str) -> String {
        match self
            .backend
            .search(topic, &self.user_id, Some(RELEVANCE_LIMIT))
            .await
        {
            Ok(records) if records.is_empty() => {
                "No relevant memories found for this topic.".to_string()
            }
            Ok(records) => {
                let mut summary = format!("Found {} relevant memories:\n", records.len());
                for (index, record) in records.iter().enumerate() {
                    summary.push_str(&format!(
                        "{}. {}\n",
                        index + 1,
                        truncate(&record.memory, 100)
                    ));
                }
                summary
            }
            Err(err) => format!("Error checking memories: {err}"),
        }
    }
}

fn render_contents(records: Vec<MemoryRecord>) -> String {
    let contents: Vec<String> = records.into_iter().map(|record| record.memory).collect();
    serde_json::to_string_pretty(&contents).unwrap_or_else(|_| "[]".to_string())
}

/// Shorten content to `max` characters, marking the cut with an ellipsis.
pub(crate) fn truncate(content: &str, max: usize) -> String {
    if content.chars().count() > max {
        let cut: String = content.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        content.to_string()
    }
}

// ============================================================================
// Registry wiring
// ============================================================================

/// Build the tool registry. The core three tools are always present; the
/// maintenance tools are added only when `advanced` is set.
pub fn build_registry(tools: Arc<MemoryTools>, advanced: bool) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register::<AddMemoryParams>("add_memory", ADD_MEMORY_DESCRIPTION, {
        let tools = tools.clone();
        Arc::new(move |arguments| {
            let tools = tools.clone();
            Box::pin(async move {
                let params: AddMemoryParams = parse_params(arguments)?;
                Ok(tools.add_memory(&params.text).await)
            })
        })
    });

    registry.register::<SearchMemoriesParams>("search_memories", SEARCH_MEMORIES_DESCRIPTION, {
        let tools = tools.clone();
        Arc::new(move |arguments| {
            let tools = tools.clone();
            Box::pin(async move {
                let params: SearchMemoriesParams = parse_params(arguments)?;
                Ok(tools.search_memories(&params.query).await)
            })
        })
    });

    registry.register::<GetAllMemoriesParams>("get_all_memories", GET_ALL_MEMORIES_DESCRIPTION, {
        let tools = tools.clone();
        Arc::new(move |arguments| {
            let tools = tools.clone();
            Box::pin(async move {
                let _: GetAllMemoriesParams = parse_params(arguments)?;
                Ok(tools.get_all_memories().await)
            })
        })
    });

    if advanced {
        registry.register::<UpdateMemoryParams>("update_memory", UPDATE_MEMORY_DESCRIPTION, {
            let tools = tools.clone();
            Arc::new(move |arguments| {
                let tools = tools.clone();
                Box::pin(async move {
                    let params: UpdateMemoryParams = parse_params(arguments)?;
                    Ok(tools.update_memory(&params.memory_id, &params.new_content).await)
                })
            })
        });

        registry.register::<DeleteMemoryParams>("delete_memory", DELETE_MEMORY_DESCRIPTION, {
            let tools = tools.clone();
            Arc::new(move |arguments| {
                let tools = tools.clone();
                Box::pin(async move {
                    let params: DeleteMemoryParams = parse_params(arguments)?;
                    Ok(tools.delete_memory(&params.memory_id).await)
                })
            })
        });

        registry.register::<GetMemoryStatsParams>(
            "get_memory_stats",
            GET_MEMORY_STATS_DESCRIPTION,
            {
                let tools = tools.clone();
                Arc::new(move |arguments| {
                    let tools = tools.clone();
                    Box::pin(async move {
                        let _: GetMemoryStatsParams = parse_params(arguments)?;
                        Ok(tools.get_memory_stats().await)
                    })
                })
            },
        );

        registry.register::<CheckRelevantMemoriesParams>(
            "check_relevant_memories",
            CHECK_RELEVANT_MEMORIES_DESCRIPTION,
            {
                let tools = tools.clone();
                Arc::new(move |arguments| {
                    let tools = tools.clone();
                    Box::pin(async move {
                        let params: CheckRelevantMemoriesParams = parse_params(arguments)?;
                        Ok(tools.check_relevant_memories(&params.topic).await)
                    })
                })
            },
        );
    }

    registry
}
