//! Tool Registry
//!
//! Information Hiding:
//! - Tool storage and lookup implementation hidden
//! - Cancellation racing hidden behind `invoke`
//! - Registration and discovery mechanisms abstracted

use super::{Tool, ToolMetadata, ToolRequest};
use crate::core::cloud::CloudGateway;
use crate::core::completion::CompletionClient;
use crate::error::{ToolError, ToolOutcome};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Tool registry for managing available tools
///
/// Keyed by name in sorted order so discovery output is stable.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a new tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.metadata().name.clone();
        tracing::info!("Registering tool: {}", name);
        self.tools.insert(name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool names
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Get all tool metadata
    pub fn list_tools(&self) -> Vec<ToolMetadata> {
        self.tools.values().map(|tool| tool.metadata()).collect()
    }

    /// Plain-text listing printed by the `list-tools` command
    pub fn tools_description(&self) -> String {
        let mut descriptions = Vec::new();
        for tool in self.tools.values() {
            let metadata = tool.metadata();
            let params = metadata
                .parameters
                .iter()
                .map(|p| {
                    let required = if p.required { "required" } else { "optional" };
                    let default = p
                        .default
                        .as_ref()
                        .map(|d| format!(", default {}", d))
                        .unwrap_or_default();
                    format!(
                        "  - {} ({}): {} [{}{}]",
                        p.name, p.param_type, p.description, required, default
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");

            descriptions.push(format!(
                "Tool: {}\nDescription: {}\nParameters:\n{}",
                metadata.name, metadata.description, params
            ));
        }
        descriptions.join("\n\n")
    }

    /// Run exactly one tool. The call is raced against `request.cancel`;
    /// losing the race drops the tool future, aborting its network call.
    pub async fn invoke(&self, request: ToolRequest) -> ToolOutcome<String> {
        let ToolRequest {
            name,
            arguments,
            cancel,
        } = request;

        let tool = self
            .get(&name)
            .ok_or_else(|| ToolError::UnknownTool(name.clone()))?;

        let arguments = match arguments {
            Value::Null => json!({}),
            Value::Object(_) => arguments,
            _ => return Err(ToolError::invalid("arguments must be a JSON object")),
        };

        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        tool.validate(&arguments)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("Tool '{}' cancelled before completion", name);
                Err(ToolError::Cancelled)
            }
            outcome = tool.execute(arguments) => outcome,
        }
    }

    /// The five gateway-backed tools
    pub fn with_gateways(completion: Arc<CompletionClient>, cloud: Arc<CloudGateway>) -> Self {
        use super::compliance::{AnalyzeComplianceTool, GenerateAuditReportTool};
        use super::logs::QueryLogsTool;
        use super::storage::{CheckStorageEncryptionTool, FetchBlobTextTool};

        let mut registry = Self::new();

        registry.register(Arc::new(AnalyzeComplianceTool::new(completion.clone())));
        registry.register(Arc::new(GenerateAuditReportTool::new(completion)));
        registry.register(Arc::new(FetchBlobTextTool::new(cloud.clone())));
        registry.register(Arc::new(QueryLogsTool::new(cloud.clone())));
        registry.register(Arc::new(CheckStorageEncryptionTool::new(cloud)));

        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
