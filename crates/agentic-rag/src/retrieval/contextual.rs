//! Contextual RAG orchestrator: indexing, retrieval and answering

use std::collections::{BTreeSet, HashMap};
use tokio::sync::OnceCell;

use crate::config::{GenerationConfig, RagConfig, RetrievalConfig};
use crate::error::{Error, Result};
use crate::generation::{parse_structured_answer, PromptBuilder};
use crate::ingestion::{Contextualizer, SemanticChunker};
use crate::providers::ProviderSet;
use crate::types::{
    AnswerOutcome, ConsistencyReport, ContextualSearchResult, Document, IndexedPassage,
    RankedPassage, RerankCandidate, RetrievalCandidate, StoredPassage,
};

use super::distance_to_score;

/// Text embedded once to size the vector collection
const DIMENSION_PROBE: &str = "test";

/// Indexes documents as contextualized passages and answers queries over them
///
/// Every passage is written to the vector index and the passage store under
/// the same id. A document is indexed completely or not at all.
pub struct ContextualRag {
    providers: ProviderSet,
    chunker: SemanticChunker,
    contextualizer: Contextualizer,
    retrieval: RetrievalConfig,
    generation: GenerationConfig,
    collection_dimension: OnceCell<usize>,
}

impl ContextualRag {
    /// Build the pipeline and its providers from configuration
    pub fn new(config: &RagConfig) -> Result<Self> {
        config.validate()?;
        let providers = ProviderSet::from_config(config)?;
        Ok(Self::with_providers(providers, config))
    }

    /// Build the pipeline over existing providers
    pub fn with_providers(providers: ProviderSet, config: &RagConfig) -> Self {
        let chunker = SemanticChunker::new(providers.embedder.clone(), &config.chunking);
        let contextualizer = Contextualizer::new(providers.llm.clone());

        Self {
            providers,
            chunker,
            contextualizer,
            retrieval: config.retrieval.clone(),
            generation: config.generation.clone(),
            collection_dimension: OnceCell::new(),
        }
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    pub fn retrieval_config(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    /// Probe the embedder once and make sure the collection exists
    async fn ensure_collection(&self) -> Result<usize> {
        self.collection_dimension
            .get_or_try_init(|| async {
                let probe = self.providers.embedder.embed(DIMENSION_PROBE).await?;
                self.providers
                    .vector_index
                    .ensure_collection(probe.len())
                    .await?;
                Ok::<usize, Error>(probe.len())
            })
            .await
            .copied()
    }

    /// Chunk, contextualize, embed and store a document.
    ///
    /// `doc_id` is recorded on every passage. On any failure nothing is left
    /// behind in either store and [`Error::Indexing`] is returned.
    pub async fn add_document(
        &self,
        doc_id: &str,
        document: &Document,
    ) -> Result<Vec<IndexedPassage>> {
        let fail = |e: Error| Error::indexing(doc_id, e.to_string());

        let mut chunks = self.chunker.split(document).await.map_err(fail)?;
        if chunks.is_empty() {
            return Err(Error::indexing(doc_id, "document produced no chunks"));
        }
        for chunk in &mut chunks {
            chunk.document_id = doc_id.to_string();
        }

        let texts = self
            .contextualizer
            .contextualize_all(&chunks, document)
            .await
            .map_err(fail)?;

        let embeddings = self
            .providers
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(fail)?;
        if embeddings.len() != texts.len() {
            return Err(Error::indexing(
                doc_id,
                format!(
                    "embedder returned {} vectors for {} passages",
                    embeddings.len(),
                    texts.len()
                ),
            ));
        }

        let dimension = self.ensure_collection().await.map_err(fail)?;
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(Error::indexing(
                doc_id,
                format!(
                    "embedding has dimension {}, collection has {}",
                    bad.len(),
                    dimension
                ),
            ));
        }

        let passages: Vec<IndexedPassage> = chunks
            .into_iter()
            .zip(texts)
            .zip(embeddings)
            .map(|((chunk, text), embedding)| IndexedPassage {
                id: chunk.id,
                document_id: chunk.document_id,
                text,
                chunk_text: chunk.text,
                position: chunk.position,
                embedding,
            })
            .collect();

        if let Err(e) = self.write_passages(&passages).await {
            self.rollback(doc_id, &passages).await;
            return Err(fail(e));
        }
        if let Err(e) = self.providers.vector_index.flush().await {
            self.rollback(doc_id, &passages).await;
            return Err(fail(e));
        }

        tracing::info!(
            "Indexed document {} as {} passages",
            doc_id,
            passages.len()
        );
        Ok(passages)
    }

    async fn write_passages(&self, passages: &[IndexedPassage]) -> Result<()> {
        for passage in passages {
            self.providers
                .vector_index
                .upsert(&passage.id, &passage.document_id, &passage.embedding)
                .await?;
            self.providers
                .passage_store
                .put(&StoredPassage::from(passage))
                .await?;
        }
        Ok(())
    }

    async fn rollback(&self, doc_id: &str, passages: &[IndexedPassage]) {
        let ids: Vec<String> = passages.iter().map(|p| p.id.clone()).collect();
        tracing::warn!(
            "Rolling back {} passages of document {}",
            ids.len(),
            doc_id
        );
        if let Err(e) = self.providers.vector_index.delete(&ids).await {
            tracing::warn!("Vector cleanup for {} failed: {}", doc_id, e);
        }
        if let Err(e) = self.providers.passage_store.delete(&ids).await {
            tracing::warn!("Passage cleanup for {} failed: {}", doc_id, e);
        }
        if let Err(e) = self.providers.vector_index.flush().await {
            tracing::warn!("Vector flush after cleanup of {} failed: {}", doc_id, e);
        }
    }

    /// Nearest passages to `query`, optionally restricted to `allowed_document_ids`
    pub async fn semantic_search(
        &self,
        query: &str,
        top_k: usize,
        allowed_document_ids: Option<&[String]>,
    ) -> Result<Vec<RetrievalCandidate>> {
        let (_, candidates) = self
            .embed_and_search(query, top_k, allowed_document_ids)
            .await?;
        Ok(candidates)
    }

    /// Query embedding plus its nearest candidates; both empty before indexing
    async fn embed_and_search(
        &self,
        query: &str,
        top_k: usize,
        allowed_document_ids: Option<&[String]>,
    ) -> Result<(Vec<f32>, Vec<RetrievalCandidate>)> {
        if self.providers.vector_index.dimension().is_none() {
            return Ok((Vec::new(), Vec::new()));
        }
        let query_embedding = self.providers.embedder.embed(query).await?;
        let candidates = self
            .providers
            .vector_index
            .search(&query_embedding, top_k, allowed_document_ids)
            .await?;
        Ok((query_embedding, candidates))
    }

    /// Retrieve, rerank and answer `query` with the configured `top_k`
    pub async fn search(
        &self,
        query: &str,
        allowed_document_ids: Option<&[String]>,
    ) -> Result<ContextualSearchResult> {
        self.contextual_search(query, self.retrieval.top_k, allowed_document_ids)
            .await
    }

    /// Retrieve `top_k` passages, rerank them, and ask the model for a
    /// structured answer over the survivors.
    pub async fn contextual_search(
        &self,
        query: &str,
        top_k: usize,
        allowed_document_ids: Option<&[String]>,
    ) -> Result<ContextualSearchResult> {
        let (query_embedding, candidates) = self
            .embed_and_search(query, top_k, allowed_document_ids)
            .await?;

        let mut rerank_input = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.providers.passage_store.get(&candidate.id).await? {
                Some(passage) => rerank_input.push(RerankCandidate {
                    id: candidate.id,
                    document_id: passage.document_id,
                    text: passage.text,
                    score: distance_to_score(candidate.distance),
                    embedding: passage.embedding,
                }),
                None => tracing::warn!(
                    "Vector {} has no stored passage; skipping",
                    candidate.id
                ),
            }
        }

        let passages: Vec<RankedPassage> = self
            .providers
            .reranker
            .rerank(query, &query_embedding, rerank_input)
            .await?
            .into_iter()
            .map(RankedPassage::from)
            .collect();

        let context = PromptBuilder::build_context(passages.iter().map(|p| p.text.as_str()));
        let outcome = self.generate_answer(query, &context).await;

        Ok(ContextualSearchResult { outcome, passages })
    }

    /// Bounded generate+parse loop
    async fn generate_answer(&self, query: &str, context: &str) -> AnswerOutcome {
        let messages = PromptBuilder::qa_messages(query, context);
        let max_attempts = self.generation.max_attempts();

        for attempt in 1..=max_attempts {
            if attempt > 1 && !self.generation.retry_backoff().is_zero() {
                tokio::time::sleep(self.generation.retry_backoff()).await;
            }

            match self.providers.llm.complete(&messages).await {
                Ok(reply) => match parse_structured_answer(&reply) {
                    Some(answer) => return AnswerOutcome::Answered(answer),
                    None => tracing::debug!(
                        "Attempt {}/{}: reply was not a structured answer",
                        attempt,
                        max_attempts
                    ),
                },
                Err(e) => tracing::warn!("Attempt {}/{}: {}", attempt, max_attempts, e),
            }
        }

        tracing::warn!("No structured answer after {} attempts", max_attempts);
        AnswerOutcome::NoAnswer {
            attempts: max_attempts,
        }
    }

    /// Remove every passage of `doc_id` from both stores
    pub async fn delete_document(&self, doc_id: &str) -> Result<usize> {
        let vectors = self
            .providers
            .vector_index
            .delete_by_document(doc_id)
            .await?;
        let passages = self
            .providers
            .passage_store
            .delete_by_document(doc_id)
            .await?;
        self.providers.vector_index.flush().await?;

        if vectors != passages {
            tracing::warn!(
                "Document {} had {} vectors but {} passages",
                doc_id,
                vectors,
                passages
            );
        }
        tracing::info!("Deleted document {} ({} passages)", doc_id, passages);
        Ok(passages.max(vectors))
    }

    /// Compare both stores and report half-written or mismatched ids
    pub async fn audit(&self) -> Result<ConsistencyReport> {
        let vectors: HashMap<String, String> = self
            .providers
            .vector_index
            .entries()
            .await?
            .into_iter()
            .map(|e| (e.id, e.document_id))
            .collect();
        let passages: HashMap<String, String> = self
            .providers
            .passage_store
            .entries()
            .await?
            .into_iter()
            .collect();

        let mut report = ConsistencyReport::default();
        let ids: BTreeSet<&String> = vectors.keys().chain(passages.keys()).collect();
        for id in ids {
            match (vectors.get(id), passages.get(id)) {
                (Some(_), None) => report.orphan_vectors.push(id.clone()),
                (None, Some(_)) => report.orphan_passages.push(id.clone()),
                (Some(a), Some(b)) if a != b => report.document_mismatches.push(id.clone()),
                _ => {}
            }
        }
        Ok(report)
    }

    /// Delete every id the audit flags from both stores
    pub async fn repair(&self) -> Result<ConsistencyReport> {
        let report = self.audit().await?;
        if report.is_consistent() {
            return Ok(report);
        }

        let ids: Vec<String> = report
            .orphan_vectors
            .iter()
            .chain(&report.orphan_passages)
            .chain(&report.document_mismatches)
            .cloned()
            .collect();
        tracing::warn!("Repairing {} inconsistent passage ids", ids.len());

        self.providers.vector_index.delete(&ids).await?;
        self.providers.passage_store.delete(&ids).await?;
        self.providers.vector_index.flush().await?;
        Ok(report)
    }
}
