//! Embedding-driven semantic chunking
//!
//! Text is split into sentences, each sentence starts a window of
//! `buffer_size` sentences, adjacent windows are compared by cosine distance,
//! and a chunk boundary is placed wherever the distance reaches the
//! configured percentile of all adjacent distances.

use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::providers::{cosine_similarity, EmbeddingProvider};
use crate::types::{Chunk, Document};

/// Distances at or below this are treated as identical content
const MIN_BREAK_DISTANCE: f32 = 1e-6;

/// Splits documents at semantic shifts between neighbouring sentences
pub struct SemanticChunker {
    embedder: Arc<dyn EmbeddingProvider>,
    buffer_size: usize,
    breakpoint_percentile_threshold: f64,
}

impl SemanticChunker {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, config: &ChunkingConfig) -> Self {
        Self {
            embedder,
            buffer_size: config.buffer_size.max(1),
            breakpoint_percentile_threshold: config.breakpoint_percentile_threshold,
        }
    }

    /// Split a document into ordered, non-empty chunks
    pub async fn split(&self, document: &Document) -> Result<Vec<Chunk>> {
        let texts = self.split_text(&document.text).await?;
        Ok(texts
            .into_iter()
            .enumerate()
            .map(|(position, text)| Chunk::new(document.id.clone(), text, position))
            .collect())
    }

    /// Split raw text into chunk texts
    pub async fn split_text(&self, text: &str) -> Result<Vec<String>> {
        let sentences = split_sentences(text);
        if sentences.len() <= 1 {
            return Ok(sentences
                .first()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| vec![s.to_string()])
                .unwrap_or_default());
        }

        let windows: Vec<String> = (0..sentences.len())
            .map(|i| {
                let end = (i + self.buffer_size).min(sentences.len());
                sentences[i..end].concat()
            })
            .collect();

        let embeddings = self
            .embedder
            .embed_batch(&windows)
            .await
            .map_err(|e| Error::Chunking(format!("window embedding failed: {}", e)))?;
        if embeddings.len() != windows.len() {
            return Err(Error::Chunking(format!(
                "embedder returned {} vectors for {} windows",
                embeddings.len(),
                windows.len()
            )));
        }

        let distances: Vec<f32> = embeddings
            .windows(2)
            .map(|pair| 1.0 - cosine_similarity(&pair[0], &pair[1]))
            .collect();

        let threshold = percentile(&distances, self.breakpoint_percentile_threshold)
            .unwrap_or(f32::INFINITY);

        let mut chunks = Vec::new();
        let mut start = 0;
        for (i, distance) in distances.iter().enumerate() {
            if *distance >= threshold && *distance > MIN_BREAK_DISTANCE {
                push_chunk(&mut chunks, &sentences[start..=i]);
                start = i + 1;
            }
        }
        push_chunk(&mut chunks, &sentences[start..]);

        tracing::debug!(
            "Split {} sentences into {} chunks (threshold {:.4})",
            sentences.len(),
            chunks.len(),
            threshold
        );
        Ok(chunks)
    }
}

fn push_chunk(chunks: &mut Vec<String>, sentences: &[&str]) {
    let text = sentences.concat();
    let text = text.trim();
    if !text.is_empty() {
        chunks.push(text.to_string());
    }
}

/// Split text into sentences, keeping trailing whitespace with each sentence.
///
/// Whitespace-only segments are folded into the preceding sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences: Vec<&str> = Vec::new();
    let mut offset = 0;

    for segment in text.split_sentence_bounds() {
        let end = offset + segment.len();
        if segment.trim().is_empty() {
            if let Some(last) = sentences.last_mut() {
                let start = end - segment.len() - last.len();
                *last = &text[start..end];
            }
        } else {
            sentences.push(&text[offset..end]);
        }
        offset = end;
    }

    sentences
}

/// Linearly interpolated percentile (`p` in `[0, 100]`); `None` when empty
pub fn percentile(values: &[f32], p: f64) -> Option<f32> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = (rank - lower as f64) as f32;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}
