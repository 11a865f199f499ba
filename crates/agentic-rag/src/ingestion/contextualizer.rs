//! Chunk contextualization with the generative-text service

use std::sync::Arc;

use crate::error::Result;
use crate::generation::PromptBuilder;
use crate::providers::LlmProvider;
use crate::types::{Chunk, Document, IndexedPassage};

/// Prepends a short, document-aware context to each chunk
pub struct Contextualizer {
    llm: Arc<dyn LlmProvider>,
}

impl Contextualizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Situate `chunk_text` within `whole_document`.
    ///
    /// Returns the generated context, a blank line, then the chunk verbatim.
    pub async fn contextualize(&self, chunk_text: &str, whole_document: &str) -> Result<String> {
        let messages = PromptBuilder::contextualize_messages(whole_document, chunk_text);
        let context = self.llm.complete(&messages).await?;
        Ok(IndexedPassage::contextualized_text(&context, chunk_text))
    }

    /// Contextualize every chunk of `document`, in order.
    ///
    /// Fails on the first generation error.
    pub async fn contextualize_all(&self, chunks: &[Chunk], document: &Document) -> Result<Vec<String>> {
        let mut texts = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            tracing::debug!(
                "Contextualizing chunk {} of document {}",
                chunk.position,
                document.id
            );
            texts.push(self.contextualize(&chunk.text, &document.text).await?);
        }
        Ok(texts)
    }
}
