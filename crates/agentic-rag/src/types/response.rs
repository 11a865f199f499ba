//! Answer and audit response types

use serde::{Deserialize, Deserializer, Serialize};

use super::query::RankedPassage;

/// Structured answer produced by the QA prompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuredAnswer {
    /// Markdown-formatted answer text
    pub result: String,
    /// Model's own judgement of whether the answer is supported by the context
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_chat_false: bool,
}

/// Accept `true`, `"true"`, `"yes"` and friends; models are not always strict
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => {
            matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1")
        }
        serde_json::Value::Number(n) => n.as_i64().map(|v| v != 0).unwrap_or(false),
        _ => false,
    })
}

/// Outcome of the bounded generate+parse loop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// A well-formed structured answer
    Answered(StructuredAnswer),
    /// Every attempt produced unparseable output
    NoAnswer { attempts: u32 },
}

impl AnswerOutcome {
    /// The structured answer, if one was produced
    pub fn answer(&self) -> Option<&StructuredAnswer> {
        match self {
            Self::Answered(answer) => Some(answer),
            Self::NoAnswer { .. } => None,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, Self::Answered(_))
    }
}

/// Result of a contextual search: the answer plus the passages it was built from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextualSearchResult {
    pub outcome: AnswerOutcome,
    /// Reranked passages, best first
    pub passages: Vec<RankedPassage>,
}

/// Cross-store consistency report
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Ids present in the vector index but missing from the passage store
    pub orphan_vectors: Vec<String>,
    /// Ids present in the passage store but missing from the vector index
    pub orphan_passages: Vec<String>,
    /// Ids present in both stores with differing document ids
    pub document_mismatches: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.orphan_vectors.is_empty()
            && self.orphan_passages.is_empty()
            && self.document_mismatches.is_empty()
    }
}
