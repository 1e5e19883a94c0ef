//! Text-completion adapters shared by correction and summarisation.

use std::fmt;
use std::str::FromStr;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod http;

pub use http::HttpLlmClient;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LlmError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("unknown LLM provider: {0}")]
    UnknownProvider(String),

    #[error("LLM provider {0} is not implemented yet")]
    ProviderNotImplemented(String),

    #[error("LLM request failed: {0}")]
    AdapterFailure(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::AdapterFailure("request timed out".to_string())
        } else {
            LlmError::AdapterFailure(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    /// Accepted in configuration, never served.
    Local,
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "local" => Ok(Provider::Local),
            _ => Err(LlmError::UnknownProvider(s.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Local => "local",
        };
        f.write_str(name)
    }
}

/// One chat completion. The provider stays a raw string so that an unknown
/// name surfaces as an error from the call rather than at configuration time.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub api_key: Option<String>,
}

impl CompletionRequest {
    /// Checks that apply before any network traffic: api key first, then the
    /// provider name.
    pub fn validate(&self) -> Result<(&str, Provider), LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        let provider: Provider = self.provider.parse()?;
        if provider == Provider::Local {
            return Err(LlmError::ProviderNotImplemented(provider.to_string()));
        }
        Ok((api_key, provider))
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(provider: &str, api_key: Option<&str>) -> CompletionRequest {
        CompletionRequest {
            system_prompt: "system".into(),
            user_prompt: "user".into(),
            provider: provider.into(),
            model: "gpt-4o".into(),
            temperature: 0.3,
            max_tokens: 4000,
            api_key: api_key.map(str::to_string),
        }
    }

    #[test]
    fn test_provider_names_are_case_insensitive() {
        assert_eq!("OpenAI".parse::<Provider>(), Ok(Provider::OpenAi));
        assert_eq!(" anthropic ".parse::<Provider>(), Ok(Provider::Anthropic));
        assert_eq!("local".parse::<Provider>(), Ok(Provider::Local));
        assert_eq!(
            "mistral".parse::<Provider>(),
            Err(LlmError::UnknownProvider("mistral".into()))
        );
    }

    #[test]
    fn test_missing_key_is_reported_before_provider() {
        assert_eq!(request("mistral", None).validate(), Err(LlmError::MissingApiKey));
        assert_eq!(request("openai", Some("  ")).validate(), Err(LlmError::MissingApiKey));
    }

    #[test]
    fn test_local_provider_is_not_implemented() {
        assert_eq!(
            request("local", Some("sk")).validate(),
            Err(LlmError::ProviderNotImplemented("local".into()))
        );
        assert_eq!(
            request("mistral", Some("sk")).validate(),
            Err(LlmError::UnknownProvider("mistral".into()))
        );
        assert_eq!(request("openai", Some("sk")).validate(), Ok(("sk", Provider::OpenAi)));
    }
}
