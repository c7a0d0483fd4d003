//! Tool registry: named async handlers plus their advertised descriptors.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ToolError;

/// Boxed async tool handler. Receives the raw arguments value and returns the
/// tool's reply text.
pub type ToolHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync>;

/// Descriptor advertised through `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: ToolHandler,
}

/// Registry of callable tools. Listing order matches registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry { tools: Vec::new() }
    }

    /// Register a tool whose input schema is derived from `P`.
    pub fn register<P: JsonSchema>(&mut self, name: &str, description: &str, handler: ToolHandler) {
        let input_schema = serde_json::to_value(schemars::schema_for!(P))
            .unwrap_or_else(|_| json!({"type": "object"}));
        self.tools.push(RegisteredTool {
            descriptor: ToolDescriptor {
                name: name.to_string(),
                description: description.to_string(),
                input_schema,
            },
            handler,
        });
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|tool| tool.descriptor.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up a tool by name and run it.
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.descriptor.name == name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        (tool.handler)(arguments).await
    }
}

/// Decode tool arguments into `P`. Absent arguments decode as an empty object
/// so zero-argument tools accept calls that omit the field entirely.
pub fn parse_params<P: DeserializeOwned>(arguments: Value) -> Result<P, ToolError> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|err| ToolError::invalid_params(err.to_string()))
}
