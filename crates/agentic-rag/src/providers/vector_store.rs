//! Vector index trait for storing and searching passage embeddings

use async_trait::async_trait;
use crate::error::Result;
use crate::types::RetrievalCandidate;

/// Id and document id of a stored vector, used for cross-store audits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorEntryRef {
    pub id: String,
    pub document_id: String,
}

/// Trait for vector storage and similarity search
///
/// The index stores `(id, document_id, embedding)` triples only; passage
/// text lives in a [`PassageStore`](super::PassageStore) under the same id.
///
/// Implementations:
/// - `LocalVectorIndex`: in-process L2 index with optional snapshot file
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the backing collection sized to `dimension` if it does not exist.
    ///
    /// Fails if a collection of a different dimension already exists.
    async fn ensure_collection(&self, dimension: usize) -> Result<()>;

    /// Dimension of the backing collection, if created
    fn dimension(&self) -> Option<usize>;

    /// Insert or replace a vector
    async fn upsert(&self, id: &str, document_id: &str, embedding: &[f32]) -> Result<()>;

    /// Return up to `k` nearest ids ordered by ascending distance.
    ///
    /// When `document_filter` is set, only vectors whose document id is in the
    /// filter are considered.
    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        document_filter: Option<&[String]>,
    ) -> Result<Vec<RetrievalCandidate>>;

    /// Delete vectors by id, returning how many existed
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    /// Delete all vectors for a document
    async fn delete_by_document(&self, document_id: &str) -> Result<usize>;

    /// List every stored `(id, document_id)` pair
    async fn entries(&self) -> Result<Vec<VectorEntryRef>>;

    /// Persist pending writes, if the backend buffers them
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Get total number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Check if store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Get provider name for logging
    fn name(&self) -> &str;
}
