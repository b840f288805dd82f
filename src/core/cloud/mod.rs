//! Azure telemetry/storage gateway
//!
//! Three independent adapters share one HTTP client and one credential:
//! - `blob`: fetch a blob and decode it as text
//! - `logs`: run a Log Analytics query and flatten the first table to text
//! - `resources`: read the blob encryption flag of a storage account

mod blob;
mod logs;
mod resources;

pub use blob::decode_text;
pub use logs::{LogQuerySpec, TabularResult, NO_RESULTS};
pub use resources::{ENCRYPTION_OFF, ENCRYPTION_ON};

use anyhow::Result;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use std::sync::Arc;

use crate::config::CloudConfig;
use crate::core::credentials::TokenCredential;
use crate::error::{ToolError, ToolOutcome};

pub(crate) const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";
pub(crate) const LOG_ANALYTICS_SCOPE: &str = "https://api.loganalytics.io/.default";
pub(crate) const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

pub struct CloudGateway {
    client: Client,
    credential: Arc<dyn TokenCredential>,
    blob_endpoint: Url,
    log_analytics_endpoint: Url,
    management_endpoint: Url,
}

impl CloudGateway {
    /// Endpoints are validated here so a bad URI fails at startup, not per call.
    pub fn new(
        credential: Arc<dyn TokenCredential>,
        blob_endpoint: &str,
        config: &CloudConfig,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            credential,
            blob_endpoint: parse_base_url("blob endpoint", blob_endpoint)?,
            log_analytics_endpoint: parse_base_url(
                "log analytics endpoint",
                &config.log_analytics_endpoint,
            )?,
            management_endpoint: parse_base_url(
                "management endpoint",
                &config.management_endpoint,
            )?,
        })
    }

    /// Attaches a bearer token for `scope`, sends, and maps failure statuses.
    async fn send_authorized(
        &self,
        request: RequestBuilder,
        scope: &str,
        resource: &str,
    ) -> ToolOutcome<Response> {
        let token = self.credential.get_token(scope).await?;
        let response = request.bearer_auth(&token.token).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ToolError::NotFound(resource.to_string()));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("[CloudGateway] {} returned {}: {}", resource, status, body);
            return Err(ToolError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

fn parse_base_url(what: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", what, raw, e))?;
    if url.cannot_be_a_base() {
        return Err(anyhow::anyhow!("Invalid {} '{}': not a base URL", what, raw));
    }
    Ok(url)
}

/// Appends percent-encoded path segments to `base`.
fn join_segments<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn require_non_empty(name: &str, value: &str) -> ToolOutcome<()> {
    if value.trim().is_empty() {
        Err(ToolError::invalid(format!("'{}' cannot be empty", name)))
    } else {
        Ok(())
    }
}
