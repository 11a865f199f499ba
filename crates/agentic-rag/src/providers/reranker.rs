//! Reranker trait and implementations
//!
//! A reranker receives the query, its embedding, and the fetched candidates
//! with their preliminary (distance-derived) scores and stored embeddings, and
//! returns a reordered subset of at most `top_n` candidates, best first.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RerankerConfig;
use crate::error::{Error, Result};
use crate::types::RerankCandidate;

use super::embedding::{cosine_similarity, EmbeddingProvider};

/// Trait for reordering retrieval candidates
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorder `candidates` for `query` and keep at most `top_n()`.
    ///
    /// `query_embedding` is the vector the candidates were retrieved with; it
    /// may be empty when the caller has none.
    async fn rerank(
        &self,
        query: &str,
        query_embedding: &[f32],
        candidates: Vec<RerankCandidate>,
    ) -> Result<Vec<RerankCandidate>>;

    /// Maximum number of candidates returned
    fn top_n(&self) -> usize;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Sort by score descending (stable) and truncate
fn sort_and_truncate(mut candidates: Vec<RerankCandidate>, top_n: usize) -> Vec<RerankCandidate> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    candidates.truncate(top_n);
    candidates
}

/// Orders candidates by their preliminary score only
pub struct ScoreReranker {
    top_n: usize,
}

impl ScoreReranker {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }
}

#[async_trait]
impl Reranker for ScoreReranker {
    async fn rerank(
        &self,
        _query: &str,
        _query_embedding: &[f32],
        candidates: Vec<RerankCandidate>,
    ) -> Result<Vec<RerankCandidate>> {
        Ok(sort_and_truncate(candidates, self.top_n))
    }

    fn top_n(&self) -> usize {
        self.top_n
    }

    fn name(&self) -> &str {
        "score"
    }
}

/// Bi-encoder reranker: cosine similarity between query and passage embeddings
///
/// Embeddings supplied with the query and candidates are used as-is; only the
/// missing ones (or ones of the wrong dimension) are computed. Ties are broken
/// by the preliminary score.
pub struct EmbeddingReranker {
    embedder: Arc<dyn EmbeddingProvider>,
    top_n: usize,
}

impl EmbeddingReranker {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, top_n: usize) -> Self {
        Self { embedder, top_n }
    }
}

#[async_trait]
impl Reranker for EmbeddingReranker {
    async fn rerank(
        &self,
        query: &str,
        query_embedding: &[f32],
        mut candidates: Vec<RerankCandidate>,
    ) -> Result<Vec<RerankCandidate>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let query_embedding = if query_embedding.is_empty() {
            self.embedder
                .embed(query)
                .await
                .map_err(|e| Error::Rerank(format!("query embedding failed: {}", e)))?
        } else {
            query_embedding.to_vec()
        };

        let missing: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.embedding.len() != query_embedding.len())
            .map(|(i, _)| i)
            .collect();
        if !missing.is_empty() {
            tracing::debug!("Embedding {} candidates without stored vectors", missing.len());
            let texts: Vec<String> = missing.iter().map(|&i| candidates[i].text.clone()).collect();
            let embeddings = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| Error::Rerank(format!("passage embedding failed: {}", e)))?;
            if embeddings.len() != missing.len() {
                return Err(Error::Rerank(format!(
                    "embedder returned {} vectors for {} passages",
                    embeddings.len(),
                    missing.len()
                )));
            }
            for (i, embedding) in missing.into_iter().zip(embeddings) {
                candidates[i].embedding = embedding;
            }
        }

        let mut scored: Vec<(f32, RerankCandidate)> = candidates
            .into_iter()
            .map(|candidate| {
                (cosine_similarity(&query_embedding, &candidate.embedding), candidate)
            })
            .collect();

        scored.sort_by(|(sim_a, a), (sim_b, b)| {
            sim_b
                .partial_cmp(sim_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
        });
        scored.truncate(self.top_n);

        Ok(scored
            .into_iter()
            .map(|(similarity, mut candidate)| {
                candidate.score = similarity;
                candidate
            })
            .collect())
    }

    fn top_n(&self) -> usize {
        self.top_n
    }

    fn name(&self) -> &str {
        "embedding"
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    texts: Vec<&'a str>,
}

#[derive(Deserialize)]
struct RerankHit {
    index: usize,
    score: f32,
}

/// Cross-encoder reranker served over HTTP (`POST {base_url}/rerank`)
///
/// Compatible with text-embeddings-inference style services hosting
/// models such as `BAAI/bge-reranker-large`.
pub struct HttpReranker {
    client: Client,
    base_url: String,
    model: String,
    top_n: usize,
}

impl HttpReranker {
    pub fn new(config: &RerankerConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| Error::config("reranker.base_url is required for the http reranker"))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            top_n: config.top_n,
        })
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        _query_embedding: &[f32],
        candidates: Vec<RerankCandidate>,
    ) -> Result<Vec<RerankCandidate>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let request = RerankRequest {
            model: &self.model,
            query,
            texts: candidates.iter().map(|c| c.text.as_str()).collect(),
        };

        let response = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Rerank(format!("Rerank request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Rerank(format!("Rerank failed: HTTP {} - {}", status, body)));
        }

        let hits: Vec<RerankHit> = response
            .json()
            .await
            .map_err(|e| Error::Rerank(format!("Failed to parse rerank response: {}", e)))?;

        let mut slots: Vec<Option<RerankCandidate>> = candidates.into_iter().map(Some).collect();
        let mut reranked = Vec::with_capacity(hits.len());
        for hit in hits {
            if let Some(mut candidate) = slots.get_mut(hit.index).and_then(Option::take) {
                candidate.score = hit.score;
                reranked.push(candidate);
            }
        }

        Ok(sort_and_truncate(reranked, self.top_n))
    }

    fn top_n(&self) -> usize {
        self.top_n
    }

    fn name(&self) -> &str {
        "http"
    }
}
