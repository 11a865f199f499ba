//! agentic-rag: contextual retrieval-augmented generation with per-conversation agents
//!
//! Documents are split into semantic chunks, each chunk is prefixed with a
//! short document-aware context from the LLM, and the result is embedded and
//! stored in a vector index and a passage store under one shared id. Queries
//! are answered from reranked passages as structured JSON. [`AgenticRag`]
//! layers tool-using conversational agents on top, one per conversation, with
//! TTL-based eviction.

pub mod agent;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod types;

pub use agent::AgenticRag;
pub use config::RagConfig;
pub use error::{Error, Result};
pub use providers::ProviderSet;
pub use retrieval::ContextualRag;
pub use types::{
    AnswerOutcome, ChatMessage, ConsistencyReport, ContextualSearchResult, Document,
    IndexedPassage, RankedPassage, StructuredAnswer,
};
