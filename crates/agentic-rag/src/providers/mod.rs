//! Provider abstractions for embeddings, LLM, vector index, passage store and reranking
//!
//! Trait-based seams that let the pipeline switch between local (Ollama,
//! in-process stores) and hosted (OpenAI, HTTP reranker) backends. Backends
//! are selected from [`RagConfig`] by [`ProviderSet::from_config`].

pub mod embedding;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod openai;
pub mod passage_store;
pub mod reranker;
pub mod vector_store;

use std::sync::Arc;

use crate::config::{
    EmbedderService, LlmService, PassageStoreService, RagConfig, RerankerService,
    VectorDbService,
};
use crate::error::Result;

pub use embedding::{cosine_similarity, EmbeddingProvider};
pub use llm::LlmProvider;
pub use local::{FsPassageStore, LocalVectorIndex, MemoryPassageStore};
pub use ollama::{OllamaEmbedder, OllamaLlm};
pub use openai::{OpenAiEmbedder, OpenAiLlm};
pub use passage_store::PassageStore;
pub use reranker::{EmbeddingReranker, HttpReranker, Reranker, ScoreReranker};
pub use vector_store::{VectorEntryRef, VectorIndex};

/// The collaborators a pipeline is built from
#[derive(Clone)]
pub struct ProviderSet {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmProvider>,
    pub vector_index: Arc<dyn VectorIndex>,
    pub passage_store: Arc<dyn PassageStore>,
    pub reranker: Arc<dyn Reranker>,
}

impl ProviderSet {
    /// Build every provider named by the configuration's service selectors
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = match config.embeddings.service {
            EmbedderService::Ollama => Arc::new(OllamaEmbedder::new(&config.embeddings)?),
            EmbedderService::OpenAi => Arc::new(OpenAiEmbedder::new(&config.embeddings)?),
        };

        let llm: Arc<dyn LlmProvider> = match config.llm.service {
            LlmService::Ollama => Arc::new(OllamaLlm::new(&config.llm)?),
            LlmService::OpenAi => Arc::new(OpenAiLlm::new(&config.llm)?),
        };

        let vector_index: Arc<dyn VectorIndex> = match config.vector_db.service {
            VectorDbService::Local => Arc::new(LocalVectorIndex::open(&config.vector_db)?),
        };

        let passage_store: Arc<dyn PassageStore> = match config.passage_store.service {
            PassageStoreService::Memory => Arc::new(MemoryPassageStore::new()),
            PassageStoreService::Filesystem => Arc::new(FsPassageStore::new(
                config.passage_store.storage_dir.clone(),
            )?),
        };

        let reranker: Arc<dyn Reranker> = match config.reranker.service {
            RerankerService::Embedding => Arc::new(EmbeddingReranker::new(
                Arc::clone(&embedder),
                config.reranker.top_n,
            )),
            RerankerService::Score => Arc::new(ScoreReranker::new(config.reranker.top_n)),
            RerankerService::Http => Arc::new(HttpReranker::new(&config.reranker)?),
        };

        tracing::info!(
            "Providers: embedder={}, llm={} ({}), vector_index={}, passage_store={}, reranker={}",
            embedder.name(),
            llm.name(),
            llm.model(),
            vector_index.name(),
            passage_store.name(),
            reranker.name()
        );

        Ok(Self {
            embedder,
            llm,
            vector_index,
            passage_store,
            reranker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds_local_stack() {
        let providers = ProviderSet::from_config(&RagConfig::default()).unwrap();
        assert_eq!(providers.embedder.name(), "ollama");
        assert_eq!(providers.llm.model(), "llama3.2:3b");
        assert_eq!(providers.vector_index.name(), "local-l2");
        assert_eq!(providers.passage_store.name(), "memory");
        assert_eq!(providers.reranker.name(), "embedding");
        assert_eq!(providers.reranker.top_n(), 5);
    }

    #[test]
    fn test_filesystem_store_and_score_reranker() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.passage_store.service = PassageStoreService::Filesystem;
        config.passage_store.storage_dir = dir.path().join("passages");
        config.reranker.service = RerankerService::Score;

        let providers = ProviderSet::from_config(&config).unwrap();
        assert_eq!(providers.passage_store.name(), "filesystem");
        assert_eq!(providers.reranker.name(), "score");
        assert!(dir.path().join("passages").is_dir());
    }
}
