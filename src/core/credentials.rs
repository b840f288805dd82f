//! Azure credential resolution
//!
//! A `TokenCredential` yields a bearer token for an OAuth scope. The default
//! chain tries the Azure CLI session, then managed identity, then an explicit
//! client secret, and the first source that produces a token wins.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::sync::Arc;
use tokio::process::Command;
use tokio::time::Duration;

use crate::error::{ToolError, ToolOutcome};

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Short name used in logs and chained error messages
    fn name(&self) -> &'static str;

    async fn get_token(&self, scope: &str) -> ToolOutcome<AccessToken>;
}

/// `https://management.azure.com/.default` -> `https://management.azure.com`
fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

// ============================================================================
// Azure CLI
// ============================================================================

pub struct AzureCliCredential {
    program: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self {
            program: "az".to_string(),
        }
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "AzureCliCredential"
    }

    async fn get_token(&self, scope: &str) -> ToolOutcome<AccessToken> {
        let output = Command::new(&self.program)
            .args(["account", "get-access-token", "--output", "json", "--scope", scope])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ToolError::Credential(format!("failed to run '{}': {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::Credential(format!(
                "'{} account get-access-token' failed: {}",
                self.program,
                stderr.trim()
            )));
        }

        let parsed: CliTokenResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| ToolError::Credential(format!("unexpected az output: {}", e)))?;

        Ok(AccessToken {
            token: parsed.access_token,
        })
    }
}

// ============================================================================
// Managed identity (App Service / IMDS)
// ============================================================================

pub struct ManagedIdentityCredential {
    client: Client,
    endpoint: String,
    identity_header: Option<String>,
    client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
}

impl ManagedIdentityCredential {
    /// Uses the App Service identity endpoint when `IDENTITY_ENDPOINT` and
    /// `IDENTITY_HEADER` are present, IMDS otherwise.
    pub fn from_env() -> Self {
        let client_id = env::var("AZURE_CLIENT_ID").ok();
        match (env::var("IDENTITY_ENDPOINT"), env::var("IDENTITY_HEADER")) {
            (Ok(endpoint), Ok(header)) => Self::new(endpoint, Some(header), client_id),
            _ => Self::new(IMDS_ENDPOINT.to_string(), None, client_id),
        }
    }

    pub fn new(endpoint: String, identity_header: Option<String>, client_id: Option<String>) -> Self {
        // Off-Azure the IMDS address is unroutable; fail fast instead of stalling the chain.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(1))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint,
            identity_header,
            client_id,
        }
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        "ManagedIdentityCredential"
    }

    async fn get_token(&self, scope: &str) -> ToolOutcome<AccessToken> {
        let resource = scope_to_resource(scope);

        let mut request = match &self.identity_header {
            Some(header) => self
                .client
                .get(&self.endpoint)
                .query(&[("api-version", APP_SERVICE_API_VERSION), ("resource", resource)])
                .header("X-IDENTITY-HEADER", header),
            None => self
                .client
                .get(&self.endpoint)
                .query(&[("api-version", IMDS_API_VERSION), ("resource", resource)])
                .header("Metadata", "true"),
        };
        if let Some(client_id) = &self.client_id {
            request = request.query(&[("client_id", client_id)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::Credential(format!("identity endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Credential(format!(
                "identity endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Credential(format!("unexpected identity response: {}", e)))?;

        Ok(AccessToken {
            token: parsed.access_token,
        })
    }
}

// ============================================================================
// Client secret
// ============================================================================

pub struct ClientSecretCredential {
    client: Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            authority_host: authority_host.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Returns `None` unless tenant, client id and secret are all set.
    pub fn from_env(authority_host: &str) -> Option<Self> {
        let tenant_id = env::var("AZURE_TENANT_ID").ok()?;
        let client_id = env::var("AZURE_CLIENT_ID").ok()?;
        let client_secret = env::var("AZURE_CLIENT_SECRET").ok()?;
        Some(Self::new(authority_host, tenant_id, client_id, client_secret))
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    fn name(&self) -> &'static str {
        "ClientSecretCredential"
    }

    async fn get_token(&self, scope: &str) -> ToolOutcome<AccessToken> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        );

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await
            .map_err(|e| ToolError::Credential(format!("token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Credential(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Credential(format!("unexpected token response: {}", e)))?;

        Ok(AccessToken {
            token: parsed.access_token,
        })
    }
}

// ============================================================================
// Chain
// ============================================================================

/// Tries each source in order until one returns a token.
pub struct ChainedTokenCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
}

impl ChainedTokenCredential {
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self { sources }
    }

    /// CLI session, managed identity, then client secret when configured.
    pub fn from_env(authority_host: &str) -> Self {
        let mut sources: Vec<Arc<dyn TokenCredential>> = vec![
            Arc::new(AzureCliCredential::new()),
            Arc::new(ManagedIdentityCredential::from_env()),
        ];
        if let Some(secret) = ClientSecretCredential::from_env(authority_host) {
            sources.push(Arc::new(secret));
        }
        Self::new(sources)
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl TokenCredential for ChainedTokenCredential {
    fn name(&self) -> &'static str {
        "ChainedTokenCredential"
    }

    async fn get_token(&self, scope: &str) -> ToolOutcome<AccessToken> {
        let mut failures = Vec::new();

        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    tracing::debug!("Acquired token for {} via {}", scope, source.name());
                    return Ok(token);
                }
                Err(e) => {
                    tracing::warn!("{} could not provide a token: {}", source.name(), e);
                    failures.push(format!("{}: {}", source.name(), e));
                }
            }
        }

        Err(ToolError::Credential(if failures.is_empty() {
            "no credential sources configured".to_string()
        } else {
            failures.join("; ")
        }))
    }
}
