//! Azure Storage tools

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{Tool, ToolMetadata};
use crate::core::cloud::CloudGateway;
use crate::error::ToolOutcome;
use crate::{tool_metadata, validate_optional_string, validate_required_string};

/// Blob download tool
pub struct FetchBlobTextTool {
    gateway: Arc<CloudGateway>,
}

impl FetchBlobTextTool {
    pub fn new(gateway: Arc<CloudGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for FetchBlobTextTool {
    fn metadata(&self) -> ToolMetadata {
        tool_metadata! {
            name: "fetch_blob_text",
            description: "Download a blob from Azure Blob Storage and return its content as text.",
            parameters: [
                {
                    name: "container",
                    type: "string",
                    description: "Blob container name",
                    required: true
                },
                {
                    name: "blob_name",
                    type: "string",
                    description: "Blob name, including any virtual directory prefix",
                    required: true
                },
                {
                    name: "encoding",
                    type: "string",
                    description: "Text encoding: 'utf8' or 'ascii'; anything else reads as UTF-8",
                    required: false,
                    default: "utf8"
                }
            ]
        }
    }

    async fn execute(&self, args: Value) -> ToolOutcome<String> {
        let container = validate_required_string!(args, "container");
        let blob_name = validate_required_string!(args, "blob_name");
        let encoding = validate_optional_string!(args, "encoding");

        tracing::info!("Fetching blob {}/{}", container, blob_name);
        self.gateway
            .fetch_blob_text(container, blob_name, encoding)
            .await
    }
}

/// Storage account encryption inspection tool
pub struct CheckStorageEncryptionTool {
    gateway: Arc<CloudGateway>,
}

impl CheckStorageEncryptionTool {
    pub fn new(gateway: Arc<CloudGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for CheckStorageEncryptionTool {
    fn metadata(&self) -> ToolMetadata {
        tool_metadata! {
            name: "check_storage_encryption",
            description: "Report whether blob service encryption is turned on for an Azure storage account.",
            parameters: [
                {
                    name: "subscription_id",
                    type: "string",
                    description: "Azure subscription ID",
                    required: true
                },
                {
                    name: "resource_group",
                    type: "string",
                    description: "Resource group containing the account",
                    required: true
                },
                {
                    name: "storage_account_name",
                    type: "string",
                    description: "Storage account name",
                    required: true
                }
            ]
        }
    }

    async fn execute(&self, args: Value) -> ToolOutcome<String> {
        let subscription_id = validate_required_string!(args, "subscription_id");
        let resource_group = validate_required_string!(args, "resource_group");
        let account_name = validate_required_string!(args, "storage_account_name");

        tracing::info!(
            "Checking encryption of storage account {} in {}",
            account_name,
            resource_group
        );
        self.gateway
            .check_storage_encryption(subscription_id, resource_group, account_name)
            .await
    }
}
