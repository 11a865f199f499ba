//! Ollama HTTP client for embeddings and chat

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::ChatMessage;

use super::retry::send_with_retry;

/// Client for a local Ollama server
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OllamaClient {
    /// Create a client for `base_url`
    pub fn new(base_url: &str, timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate an embedding with `POST /api/embeddings`
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model,
            prompt: text,
        };

        let response = send_with_retry("Ollama", self.max_retries, || {
            self.client.post(&url).json(&request)
        })
        .await
        .map_err(Error::Embedding)?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Invalid Ollama embedding response: {}", e)))?;

        if body.embedding.is_empty() {
            return Err(Error::embedding(format!(
                "Ollama returned an empty embedding (is '{}' an embedding model?)",
                model
            )));
        }
        Ok(body.embedding)
    }

    /// Run a non-streaming chat completion with `POST /api/chat`
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model,
            messages,
            stream: false,
            options: ChatOptions { temperature },
        };

        let response = send_with_retry("Ollama", self.max_retries, || {
            self.client.post(&url).json(&request)
        })
        .await
        .map_err(Error::Llm)?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::llm(format!("Invalid Ollama chat response: {}", e)))?;
        Ok(body.message.content)
    }

    /// Check the server answers `GET /api/tags`
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("Ollama health check failed at {}: {}", self.base_url, e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_shape() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let request = ChatRequest {
            model: "llama3.2:3b",
            messages: &messages,
            stream: false,
            options: ChatOptions { temperature: 0.2 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = OllamaClient::new("http://localhost:11434/", Duration::from_secs(1), 0).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }
}
