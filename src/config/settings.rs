use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

const DEFAULT_COMPLETION_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_API_VERSION: &str = "2023-06-01";
const DEFAULT_LOG_ANALYTICS_ENDPOINT: &str = "https://api.loganalytics.io";
const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub completion: CompletionConfig,
    pub cloud: CloudConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub model: String,
    pub api_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    pub log_analytics_endpoint: String,
    pub management_endpoint: String,
    pub authority_host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    /// Defaults, then `config/{CONFIG_ENV}`, then `APP__*` variables.
    /// `ANTHROPIC_MODEL` overrides the completion model when set.
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());
        Self::from_sources(
            &config_env,
            Environment::with_prefix("APP").separator("__"),
            non_empty_var("ANTHROPIC_MODEL"),
        )
    }

    fn from_sources(
        config_env: &str,
        environment: Environment,
        model_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("completion.endpoint", DEFAULT_COMPLETION_ENDPOINT)?
            .set_default("completion.model", DEFAULT_MODEL)?
            .set_default("completion.api_version", DEFAULT_API_VERSION)?
            .set_default("cloud.log_analytics_endpoint", DEFAULT_LOG_ANALYTICS_ENDPOINT)?
            .set_default("cloud.management_endpoint", DEFAULT_MANAGEMENT_ENDPOINT)?
            .set_default("cloud.authority_host", DEFAULT_AUTHORITY_HOST)?
            .set_default("server.name", env!("CARGO_PKG_NAME"))?
            .set_default("server.version", env!("CARGO_PKG_VERSION"))?
            .set_default("logging.level", "info")?
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(environment)
            .set_override_option("completion.model", model_override)?
            .build()?;

        config.try_deserialize()
    }

    pub fn api_key() -> Result<String> {
        non_empty_var("ANTHROPIC_API_KEY")
            .ok_or_else(|| anyhow::anyhow!("ANTHROPIC_API_KEY environment variable not set"))
    }

    pub fn blob_endpoint() -> Result<String> {
        non_empty_var("AZURE_STORAGE_BLOB_ENDPOINT").ok_or_else(|| {
            anyhow::anyhow!("AZURE_STORAGE_BLOB_ENDPOINT environment variable not set")
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            completion: CompletionConfig {
                endpoint: DEFAULT_COMPLETION_ENDPOINT.to_string(),
                model: DEFAULT_MODEL.to_string(),
                api_version: DEFAULT_API_VERSION.to_string(),
            },
            cloud: CloudConfig {
                log_analytics_endpoint: DEFAULT_LOG_ANALYTICS_ENDPOINT.to_string(),
                management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
                authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            },
            server: ServerConfig {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
