//! Document ingestion: semantic chunking and contextualization

mod chunker;
mod contextualizer;

pub use chunker::{percentile, split_sentences, SemanticChunker};
pub use contextualizer::Contextualizer;
