//! Tool System - the callable operations exposed to MCP clients
//!
//! Information Hiding:
//! - Prompt templates and backend calls hidden behind the `Tool` trait
//! - Parameter schemas are plain data attached to each tool
//! - Registry lookup and cancellation handled in one place

pub mod compliance;
pub mod logs;
pub mod macros;
pub mod registry;
pub mod storage;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use tokio_util::sync::CancellationToken;

use crate::error::ToolOutcome;

/// Tool parameter schema definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: String,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Tool metadata - describes what the tool does and how to use it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolMetadata {
    /// JSON Schema for the tool's arguments object, as listed by `tools/list`.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut property = json!({
                "type": param.param_type,
                "description": param.description,
            });
            if let Some(default) = &param.default {
                property["default"] = default.clone();
            }
            properties.insert(param.name.clone(), property);
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

impl fmt::Display for ToolMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.description)
    }
}

/// One invocation: tool name, JSON arguments object, and the caller's
/// cancellation signal.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub name: String,
    pub arguments: Value,
    pub cancel: CancellationToken,
}

impl ToolRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Tool trait - All tools must implement this
///
/// `execute` performs at most one backend call and returns its text result.
/// Dropping the returned future aborts that call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get tool metadata (name, description, parameters)
    fn metadata(&self) -> ToolMetadata;

    /// Execute the tool with a JSON object of arguments
    async fn execute(&self, args: Value) -> ToolOutcome<String>;

    /// Validate arguments before execution (optional)
    fn validate(&self, _args: &Value) -> ToolOutcome<()> {
        Ok(())
    }
}
