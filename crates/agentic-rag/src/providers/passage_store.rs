//! Passage store trait for full passage text

use async_trait::async_trait;
use crate::error::Result;
use crate::types::StoredPassage;

/// Trait for the full-text side of an indexed passage
///
/// Exists because vector backends commonly cap payload size; the passage
/// store has no such limit and is keyed by the same id as the vector index.
///
/// Implementations:
/// - `MemoryPassageStore`: process-local map
/// - `FsPassageStore`: one JSON file per passage
#[async_trait]
pub trait PassageStore: Send + Sync {
    /// Insert or replace a passage
    async fn put(&self, passage: &StoredPassage) -> Result<()>;

    /// Fetch a passage by id
    async fn get(&self, id: &str) -> Result<Option<StoredPassage>>;

    /// Delete passages by id, returning how many existed
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    /// Delete all passages of a document
    async fn delete_by_document(&self, document_id: &str) -> Result<usize>;

    /// List every stored `(id, document_id)` pair
    async fn entries(&self) -> Result<Vec<(String, String)>>;

    /// Get total number of passages stored
    async fn len(&self) -> Result<usize>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
