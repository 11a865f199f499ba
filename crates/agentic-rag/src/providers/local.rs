//! Local provider implementations: in-process vector index and passage stores

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::types::{RetrievalCandidate, StoredPassage};

use super::passage_store::PassageStore;
use super::vector_store::{VectorEntryRef, VectorIndex};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVector {
    document_id: String,
    embedding: Vec<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Collection {
    dimension: usize,
    vectors: HashMap<String, StoredVector>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    collection: String,
    dimension: usize,
    entries: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    id: String,
    document_id: String,
    embedding: Vec<f32>,
}

/// Squared euclidean distance
fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// In-process brute-force vector index using squared L2 distance
///
/// The collection is created lazily by [`VectorIndex::ensure_collection`].
/// With a `storage_path`, the collection is loaded from and flushed to a JSON
/// snapshot; `reinit` drops any existing snapshot on open.
pub struct LocalVectorIndex {
    collection_name: String,
    collection: RwLock<Option<Collection>>,
    storage_path: Option<PathBuf>,
    dirty: AtomicBool,
    /// Serializes snapshot writes to `storage_path`
    flush_lock: AsyncMutex<()>,
}

impl LocalVectorIndex {
    /// Create an empty, memory-only index
    pub fn in_memory(collection_name: impl Into<String>) -> Self {
        Self {
            collection_name: collection_name.into(),
            collection: RwLock::new(None),
            storage_path: None,
            dirty: AtomicBool::new(false),
            flush_lock: AsyncMutex::new(()),
        }
    }

    /// Open an index from config, honouring `storage_path` and `reinit`
    pub fn open(config: &VectorDbConfig) -> Result<Self> {
        let mut index = Self::in_memory(config.collection.clone());
        let Some(path) = config.storage_path.clone() else {
            return Ok(index);
        };

        if config.reinit && path.exists() {
            tracing::info!(
                "Dropping collection '{}' ({})",
                config.collection,
                path.display()
            );
            std::fs::remove_file(&path)?;
        } else if path.exists() {
            let collection = Self::load_snapshot(&path, &config.collection)?;
            tracing::info!(
                "Loaded collection '{}' with {} vectors (dim {})",
                config.collection,
                collection.vectors.len(),
                collection.dimension
            );
            *index.collection.get_mut() = Some(collection);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        index.storage_path = Some(path);
        Ok(index)
    }

    fn load_snapshot(path: &Path, expected_name: &str) -> Result<Collection> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        if snapshot.collection != expected_name {
            return Err(Error::vector_db(format!(
                "Snapshot {} holds collection '{}', expected '{}'",
                path.display(),
                snapshot.collection,
                expected_name
            )));
        }

        let mut vectors = HashMap::with_capacity(snapshot.entries.len());
        for entry in snapshot.entries {
            if entry.embedding.len() != snapshot.dimension {
                return Err(Error::vector_db(format!(
                    "Snapshot entry {} has dimension {}, collection has {}",
                    entry.id,
                    entry.embedding.len(),
                    snapshot.dimension
                )));
            }
            vectors.insert(
                entry.id,
                StoredVector {
                    document_id: entry.document_id,
                    embedding: entry.embedding,
                },
            );
        }

        Ok(Collection {
            dimension: snapshot.dimension,
            vectors,
        })
    }

    fn snapshot(&self) -> Option<Snapshot> {
        let guard = self.collection.read();
        let collection = guard.as_ref()?;
        let mut entries: Vec<SnapshotEntry> = collection
            .vectors
            .iter()
            .map(|(id, v)| SnapshotEntry {
                id: id.clone(),
                document_id: v.document_id.clone(),
                embedding: v.embedding.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Some(Snapshot {
            collection: self.collection_name.clone(),
            dimension: collection.dimension,
            entries,
        })
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, AtomicOrdering::Release);
    }
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        if dimension == 0 {
            return Err(Error::vector_db("Cannot create a collection of dimension 0"));
        }

        let mut guard = self.collection.write();
        match guard.as_ref() {
            Some(existing) if existing.dimension != dimension => Err(Error::vector_db(format!(
                "Collection '{}' has dimension {}, embedder produces {}",
                self.collection_name, existing.dimension, dimension
            ))),
            Some(_) => Ok(()),
            None => {
                tracing::info!(
                    "Creating collection '{}' (dim {})",
                    self.collection_name,
                    dimension
                );
                *guard = Some(Collection {
                    dimension,
                    vectors: HashMap::new(),
                });
                self.mark_dirty();
                Ok(())
            }
        }
    }

    fn dimension(&self) -> Option<usize> {
        self.collection.read().as_ref().map(|c| c.dimension)
    }

    async fn upsert(&self, id: &str, document_id: &str, embedding: &[f32]) -> Result<()> {
        let mut guard = self.collection.write();
        let collection = guard.as_mut().ok_or_else(|| {
            Error::vector_db(format!(
                "Collection '{}' has not been created",
                self.collection_name
            ))
        })?;

        if embedding.len() != collection.dimension {
            return Err(Error::vector_db(format!(
                "Embedding for {} has dimension {}, collection has {}",
                id,
                embedding.len(),
                collection.dimension
            )));
        }

        collection.vectors.insert(
            id.to_string(),
            StoredVector {
                document_id: document_id.to_string(),
                embedding: embedding.to_vec(),
            },
        );
        self.mark_dirty();
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        document_filter: Option<&[String]>,
    ) -> Result<Vec<RetrievalCandidate>> {
        let guard = self.collection.read();
        let Some(collection) = guard.as_ref() else {
            return Ok(Vec::new());
        };

        if query_embedding.len() != collection.dimension {
            return Err(Error::vector_db(format!(
                "Query has dimension {}, collection has {}",
                query_embedding.len(),
                collection.dimension
            )));
        }

        let mut hits: Vec<RetrievalCandidate> = collection
            .vectors
            .iter()
            .filter(|(_, v)| {
                document_filter.map_or(true, |allowed| allowed.contains(&v.document_id))
            })
            .map(|(id, v)| RetrievalCandidate {
                id: id.clone(),
                document_id: v.document_id.clone(),
                distance: l2_distance(query_embedding, &v.embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut guard = self.collection.write();
        let Some(collection) = guard.as_mut() else {
            return Ok(0);
        };
        let removed = ids
            .iter()
            .filter(|id| collection.vectors.remove(id.as_str()).is_some())
            .count();
        if removed > 0 {
            self.mark_dirty();
        }
        Ok(removed)
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        let mut guard = self.collection.write();
        let Some(collection) = guard.as_mut() else {
            return Ok(0);
        };
        let before = collection.vectors.len();
        collection.vectors.retain(|_, v| v.document_id != document_id);
        let removed = before - collection.vectors.len();
        if removed > 0 {
            self.mark_dirty();
        }
        Ok(removed)
    }

    async fn entries(&self) -> Result<Vec<VectorEntryRef>> {
        let guard = self.collection.read();
        Ok(guard
            .as_ref()
            .map(|c| {
                c.vectors
                    .iter()
                    .map(|(id, v)| VectorEntryRef {
                        id: id.clone(),
                        document_id: v.document_id.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn flush(&self) -> Result<()> {
        let Some(path) = self.storage_path.clone() else {
            return Ok(());
        };

        // one writer at a time; a later flush always snapshots later state
        let _guard = self.flush_lock.lock().await;
        if !self.dirty.swap(false, AtomicOrdering::AcqRel) {
            return Ok(());
        }
        let Some(snapshot) = self.snapshot() else {
            return Ok(());
        };

        let json = match serde_json::to_vec(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                self.mark_dirty();
                return Err(e.into());
            }
        };
        let result = write_atomic(&path, &json).await;

        if let Err(e) = result {
            self.mark_dirty();
            return Err(Error::vector_db(format!(
                "Failed to flush collection to {}: {}",
                path.display(),
                e
            )));
        }
        tracing::debug!(
            "Flushed {} vectors to {}",
            snapshot.entries.len(),
            path.display()
        );
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self
            .collection
            .read()
            .as_ref()
            .map(|c| c.vectors.len())
            .unwrap_or(0))
    }

    fn name(&self) -> &str {
        "local-l2"
    }
}

/// Process-local passage store
#[derive(Default)]
pub struct MemoryPassageStore {
    passages: DashMap<String, StoredPassage>,
}

impl MemoryPassageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PassageStore for MemoryPassageStore {
    async fn put(&self, passage: &StoredPassage) -> Result<()> {
        self.passages.insert(passage.id.clone(), passage.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<StoredPassage>> {
        Ok(self.passages.get(id).map(|p| p.value().clone()))
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        Ok(ids
            .iter()
            .filter(|id| self.passages.remove(id.as_str()).is_some())
            .count())
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        let before = self.passages.len();
        self.passages.retain(|_, p| p.document_id != document_id);
        Ok(before - self.passages.len())
    }

    async fn entries(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .passages
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().document_id.clone()))
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.passages.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Filesystem passage store: one `<id>.json` file per passage
pub struct FsPassageStore {
    storage_dir: PathBuf,
}

impl FsPassageStore {
    /// Create a store rooted at `storage_dir`, creating the directory
    pub fn new(storage_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&storage_dir)?;
        Ok(Self { storage_dir })
    }

    /// Get path for a passage
    fn passage_path(&self, id: &str) -> PathBuf {
        self.storage_dir.join(format!("{}.json", encode_file_stem(id)))
    }

    async fn read_all(&self) -> Result<Vec<StoredPassage>> {
        let mut passages = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.storage_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |e| e == "json") {
                let content = tokio::fs::read_to_string(&path).await?;
                match serde_json::from_str::<StoredPassage>(&content) {
                    Ok(passage) => passages.push(passage),
                    Err(e) => tracing::warn!("Skipping unreadable passage {}: {}", path.display(), e),
                }
            }
        }

        Ok(passages)
    }
}

/// Write `contents` to a unique sibling temp file, then rename it over `path`
async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    if let Err(e) = tokio::fs::write(&tmp, contents).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Map an arbitrary id to a filename-safe stem
fn encode_file_stem(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02x}", byte));
        }
    }
    out
}

#[async_trait]
impl PassageStore for FsPassageStore {
    async fn put(&self, passage: &StoredPassage) -> Result<()> {
        let path = self.passage_path(&passage.id);
        let json = serde_json::to_vec(passage)?;
        write_atomic(&path, &json).await.map_err(|e| {
            Error::passage_store(format!("Failed to write passage {}: {}", passage.id, e))
        })
    }

    async fn get(&self, id: &str) -> Result<Option<StoredPassage>> {
        let path = self.passage_path(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::passage_store(format!(
                "Failed to read passage {}: {}",
                id, e
            ))),
        }
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            match tokio::fs::remove_file(self.passage_path(id)).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        let ids: Vec<String> = self
            .read_all()
            .await?
            .into_iter()
            .filter(|p| p.document_id == document_id)
            .map(|p| p.id)
            .collect();
        self.delete(&ids).await
    }

    async fn entries(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .map(|p| (p.id, p.document_id))
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.read_all().await?.len())
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}
