//! Error types for the RAG pipeline and agent sessions

use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG system errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (invalid value, missing key, unknown service)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector index error
    #[error("Vector index error: {0}")]
    VectorDb(String),

    /// Passage (full-text) store error
    #[error("Passage store error: {0}")]
    PassageStore(String),

    /// LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Reranker error
    #[error("Rerank error: {0}")]
    Rerank(String),

    /// Chunking error
    #[error("Chunking failed: {0}")]
    Chunking(String),

    /// A document could not be indexed; nothing was committed for it
    #[error("Failed to index document '{doc_id}': {message}")]
    Indexing { doc_id: String, message: String },

    /// Chat was attempted against a conversation without a live session
    #[error("No live agent session for conversation '{0}'")]
    SessionNotFound(String),

    /// Agent session construction failed
    #[error("Failed to build agent session: {0}")]
    SessionBuild(String),

    /// Agent tool error
    #[error("Tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector index error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create a passage store error
    pub fn passage_store(message: impl Into<String>) -> Self {
        Self::PassageStore(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an indexing error for a document
    pub fn indexing(doc_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Indexing {
            doc_id: doc_id.into(),
            message: message.into(),
        }
    }

    /// Create a tool error
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error is a caller contract violation rather than a fault
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::SessionNotFound(_))
    }
}
