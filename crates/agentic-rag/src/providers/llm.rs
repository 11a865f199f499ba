//! LLM provider trait for chat completion

use async_trait::async_trait;
use crate::error::Result;
use crate::types::ChatMessage;

/// Trait for generative-text services
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (`/api/chat`)
/// - `OpenAiLlm`: OpenAI chat completions
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete an ordered list of role-tagged messages, returning the reply text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
