//! Compliance Gateway - MCP tool server for compliance and Azure inspection
//!
//! Exposes five tools over stdio: two that prompt a hosted completion model
//! (compliance analysis, audit reports) and three that call Azure APIs
//! (blob text, Log Analytics queries, storage encryption status).

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod tools;
pub mod utils;

pub use config::Settings;
pub use error::{ErrorKind, ToolError};
pub use tools::registry::ToolRegistry;
pub use tools::{Tool, ToolMetadata, ToolRequest};

use std::sync::Arc;

use crate::core::cloud::CloudGateway;
use crate::core::completion::CompletionClient;
use crate::core::credentials::ChainedTokenCredential;

/// Build the registry from settings and the environment.
/// Fails when a required secret or endpoint is missing or malformed.
pub fn build_registry(settings: &Settings) -> anyhow::Result<ToolRegistry> {
    let api_key = Settings::api_key()?;
    let blob_endpoint = Settings::blob_endpoint()?;

    let credential = ChainedTokenCredential::from_env(&settings.cloud.authority_host);
    tracing::info!("Azure credential chain: {}", credential.source_names().join(" -> "));

    let completion = Arc::new(CompletionClient::new(api_key, settings.completion.clone()));
    let cloud = Arc::new(CloudGateway::new(
        Arc::new(credential),
        &blob_endpoint,
        &settings.cloud,
    )?);

    tracing::info!("Completion model: {}", completion.model());
    Ok(ToolRegistry::with_gateways(completion, cloud))
}
