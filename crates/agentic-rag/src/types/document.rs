//! Document, chunk and indexed passage types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A caller-owned document handed to the indexing pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Opaque document identifier
    pub id: String,
    /// Full text
    pub text: String,
    /// Arbitrary metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    /// Create a document without metadata
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A contiguous span of a document produced by semantic splitting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Chunk identifier, reused as the passage id in both stores
    pub id: String,
    /// Parent document identifier
    pub document_id: String,
    /// Raw chunk text (before contextualization)
    pub text: String,
    /// Position within the document (0-based)
    pub position: usize,
}

impl Chunk {
    /// Create a chunk with a fresh id
    pub fn new(document_id: impl Into<String>, text: impl Into<String>, position: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            text: text.into(),
            position,
        }
    }
}

/// The unit of retrieval: a contextualized chunk with its embedding
///
/// `id` is the joint key shared by the vector index and the passage store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedPassage {
    /// Passage id (the chunk id)
    pub id: String,
    /// Parent document identifier
    pub document_id: String,
    /// Situating context followed by the original chunk text
    pub text: String,
    /// Original chunk text
    pub chunk_text: String,
    /// Position of the source chunk within the document
    pub position: usize,
    /// Embedding of `text`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

impl IndexedPassage {
    /// Join a situating context with the original chunk text
    pub fn contextualized_text(context: &str, chunk_text: &str) -> String {
        format!("{}\n\n{}", context.trim(), chunk_text)
    }
}

/// A passage as stored in (and fetched from) the passage store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredPassage {
    /// Passage id
    pub id: String,
    /// Parent document identifier
    pub document_id: String,
    /// Contextualized text
    pub text: String,
    /// Embedding of `text`
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl From<&IndexedPassage> for StoredPassage {
    fn from(passage: &IndexedPassage) -> Self {
        Self {
            id: passage.id.clone(),
            document_id: passage.document_id.clone(),
            text: passage.text.clone(),
            embedding: passage.embedding.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contextualized_text_keeps_chunk_verbatim() {
        let text = IndexedPassage::contextualized_text("  About colours.\n", "Grass is green.");
        assert_eq!(text, "About colours.\n\nGrass is green.");
        assert!(text.ends_with("Grass is green."));
    }

    #[test]
    fn test_chunk_ids_are_unique() {
        let a = Chunk::new("doc", "one", 0);
        let b = Chunk::new("doc", "one", 0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_document_metadata() {
        let doc = Document::new("d1", "text").with_metadata("source", serde_json::json!("upload"));
        assert_eq!(doc.metadata["source"], "upload");
    }
}
