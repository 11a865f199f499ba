//! Core types for the RAG system

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, Document, IndexedPassage, StoredPassage};
pub use query::{ChatMessage, RankedPassage, RerankCandidate, RetrievalCandidate, Role};
pub use response::{AnswerOutcome, ConsistencyReport, ContextualSearchResult, StructuredAnswer};
