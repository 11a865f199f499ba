//! Chat message and retrieval candidate types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message sent to the generative-text service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A vector search hit: passage id, document id and distance (lower is closer)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalCandidate {
    pub id: String,
    pub document_id: String,
    pub distance: f32,
}

/// Input to a reranker: passage text with its preliminary relevance score
#[derive(Debug, Clone, PartialEq)]
pub struct RerankCandidate {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub score: f32,
    /// Embedding stored with the passage; empty when the store has none
    pub embedding: Vec<f32>,
}

/// A passage after reranking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedPassage {
    pub id: String,
    pub document_id: String,
    pub text: String,
    /// Score assigned by the reranker
    pub score: f32,
}

impl From<RerankCandidate> for RankedPassage {
    fn from(candidate: RerankCandidate) -> Self {
        Self {
            id: candidate.id,
            document_id: candidate.document_id,
            text: candidate.text,
            score: candidate.score,
        }
    }
}
