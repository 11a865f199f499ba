//! OpenAI-backed providers for embeddings and LLM

use async_trait::async_trait;
use std::time::Duration;

use crate::config::{EmbeddingConfig, LlmConfig, OPENAI_API_KEY_ENV};
use crate::error::{Error, Result};
use crate::generation::OpenAiClient;
use crate::types::ChatMessage;

use super::embedding::EmbeddingProvider;
use super::llm::LlmProvider;

fn require_key(key: Option<&String>, section: &str) -> Result<String> {
    key.cloned().ok_or_else(|| {
        Error::config(format!(
            "{}.api_key or {} is required for the openai service",
            section, OPENAI_API_KEY_ENV
        ))
    })
}

/// OpenAI embeddings provider (text-embedding-3-small by default)
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = require_key(config.api_key.as_ref(), "embeddings")?;
        let client = OpenAiClient::new(
            config.base_url(),
            api_key,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self {
            client,
            model: config.model().to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client
            .embed_batch(&self.model, &[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::embedding("OpenAI returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.client.embed_batch(&self.model, texts).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// OpenAI chat-completions provider
pub struct OpenAiLlm {
    client: OpenAiClient,
    model: String,
    temperature: f32,
}

impl OpenAiLlm {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = require_key(config.api_key.as_ref(), "llm")?;
        let client = OpenAiClient::new(
            config.base_url(),
            api_key,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self {
            client,
            model: config.model().to_string(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiLlm {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.client
            .chat(&self.model, messages, self.temperature)
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmService;

    #[test]
    fn test_missing_key_is_config_error() {
        let config = LlmConfig {
            service: LlmService::OpenAi,
            api_key: None,
            ..LlmConfig::default()
        };
        assert!(matches!(OpenAiLlm::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_model_defaults_follow_service() {
        let config = LlmConfig {
            service: LlmService::OpenAi,
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        let llm = OpenAiLlm::new(&config).unwrap();
        assert_eq!(llm.model(), "gpt-4o-mini");
    }
}
