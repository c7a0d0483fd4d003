//! Parameter types for the memory tools.
//!
//! Each struct doubles as the deserialization target for tool arguments and
//! the source of the JSON schema advertised through `tools/list`.

use schemars::JsonSchema;
use serde::Deserialize;

/// Parameters for the `add_memory` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddMemoryParams {
    #[schemars(description = "The information to store")]
    pub text: String,
}

/// Parameters for the `search_memories` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchMemoriesParams {
    #[schemars(description = "Search query to match against stored memories")]
    pub query: String,
}

/// Parameters for the `get_all_memories` tool. Takes no arguments.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct GetAllMemoriesParams {}

/// Parameters for the `update_memory` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateMemoryParams {
    #[schemars(description = "Id of the memory to update")]
    pub memory_id: String,
    #[schemars(description = "Replacement content for the memory")]
    pub new_content: String,
}

/// Parameters for the `delete_memory` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteMemoryParams {
    #[schemars(description = "Id of the memory to delete")]
    pub memory_id: String,
}

/// Parameters for the `get_memory_stats` tool. Takes no arguments.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct GetMemoryStatsParams {}

/// Parameters for the `check_relevant_memories` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CheckRelevantMemoriesParams {
    #[schemars(description = "Topic to check for relevant memories")]
    pub topic: String,
}
