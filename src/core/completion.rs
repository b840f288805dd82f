use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::config::CompletionConfig;
use crate::error::{ToolError, ToolOutcome};

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

/// Client for a hosted Messages-style completion endpoint.
///
/// One `complete` call is exactly one POST. There is no retry: a failed call
/// is reported to the caller as-is.
pub struct CompletionClient {
    client: Client,
    api_key: String,
    config: CompletionConfig,
}

impl CompletionClient {
    pub fn new(api_key: String, config: CompletionConfig) -> Self {
        Self {
            client: Client::new(),
            api_key,
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> ToolOutcome<String> {
        if prompt.trim().is_empty() {
            return Err(ToolError::invalid("prompt cannot be empty"));
        }
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ToolError::invalid(format!(
                "temperature must be within [0, 1], got {}",
                temperature
            )));
        }
        if max_tokens == 0 {
            return Err(ToolError::invalid("max_tokens must be positive"));
        }

        let request = CompletionRequest {
            model: &self.config.model,
            max_tokens,
            temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        tracing::debug!(
            "[CompletionClient] POST {} (model={}, max_tokens={}, temperature={})",
            self.config.endpoint,
            self.config.model,
            max_tokens,
            temperature
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.api_version)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("[CompletionClient] API returned error status {}: {}", status, body);
            return Err(ToolError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        first_text_block(&body)
    }
}

/// Extracts `content[0].text` from a Messages API response body.
fn first_text_block(body: &str) -> ToolOutcome<String> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|e| ToolError::MalformedResponse(format!("response is not JSON: {}", e)))?;

    let first = payload
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ToolError::MalformedResponse("missing 'content' array".to_string()))?
        .first()
        .ok_or_else(|| ToolError::MalformedResponse("'content' array is empty".to_string()))?;

    first
        .get("text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ToolError::MalformedResponse("first content block has no 'text' field".to_string())
        })
}
