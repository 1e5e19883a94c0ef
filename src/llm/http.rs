use std::time::Duration;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{CompletionRequest, LlmClient, LlmError, Provider};
use crate::config::EndpointConfig;

/// Hosted OpenAI / Anthropic chat endpoints over reqwest.
pub struct HttpLlmClient {
    client: reqwest::Client,
    endpoints: EndpointConfig,
}

impl HttpLlmClient {
    pub fn new(endpoints: EndpointConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoints.timeout_secs))
            .build()?;
        Ok(Self { client, endpoints })
    }

    async fn openai(&self, api_key: &str, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.endpoints.openai_base_url.trim_end_matches('/'));
        let body = json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt }
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens
        });

        let response = self.client.post(&url).bearer_auth(api_key).json(&body).send().await?;
        let reply = read_json(response).await?;
        openai_text(&reply)
    }

    async fn anthropic(&self, api_key: &str, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/messages", self.endpoints.anthropic_base_url.trim_end_matches('/'));
        let body = json!({
            "model": request.model,
            "system": request.system_prompt,
            "messages": [
                { "role": "user", "content": request.user_prompt }
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.endpoints.anthropic_version)
            .json(&body)
            .send()
            .await?;
        let reply = read_json(response).await?;
        anthropic_text(&reply)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let (api_key, provider) = request.validate()?;
        debug!("Sending completion to {} ({})", provider, request.model);

        match provider {
            Provider::OpenAi => self.openai(api_key, request).await,
            Provider::Anthropic => self.anthropic(api_key, request).await,
            Provider::Local => Err(LlmError::ProviderNotImplemented(provider.to_string())),
        }
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, LlmError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        warn!("LLM endpoint answered {}: {}", status, text);
        return Err(LlmError::AdapterFailure(format!("HTTP {}: {}", status, text)));
    }
    serde_json::from_str(&text)
        .map_err(|e| LlmError::AdapterFailure(format!("invalid response body: {}", e)))
}

fn openai_text(reply: &Value) -> Result<String, LlmError> {
    non_empty(reply["choices"][0]["message"]["content"].as_str())
}

fn anthropic_text(reply: &Value) -> Result<String, LlmError> {
    let text = reply["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|block| block["type"] == "text")
                .filter_map(|block| block["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        });
    non_empty(text.as_deref())
}

fn non_empty(text: Option<&str>) -> Result<String, LlmError> {
    match text.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(LlmError::AdapterFailure("empty response".to_string())),
    }
}
