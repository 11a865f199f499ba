//! Agent tools

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::retrieval::ContextualRag;
use crate::types::AnswerOutcome;

/// A capability the agent may invoke with a plain-text input
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses in `Action:` lines
    fn name(&self) -> &str;

    /// One-line description shown to the model
    fn description(&self) -> &str;

    /// Run the tool, returning the observation text
    async fn call(&self, input: &str) -> Result<String>;
}

/// Name of the knowledge-base retrieval tool
pub const RETRIEVAL_TOOL_NAME: &str = "knowledge_search";

const NO_ANSWER: &str = "The knowledge base did not produce an answer for this input.";

/// Contextual search over the knowledge base, scoped to an allow-list of documents
pub struct RetrievalTool {
    rag: Arc<ContextualRag>,
    allowed_document_ids: Option<Vec<String>>,
    top_k: usize,
}

impl RetrievalTool {
    pub fn new(
        rag: Arc<ContextualRag>,
        allowed_document_ids: Option<Vec<String>>,
        top_k: usize,
    ) -> Self {
        Self {
            rag,
            allowed_document_ids,
            top_k,
        }
    }

    pub fn allowed_document_ids(&self) -> Option<&[String]> {
        self.allowed_document_ids.as_deref()
    }
}

#[async_trait]
impl Tool for RetrievalTool {
    fn name(&self) -> &str {
        RETRIEVAL_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Searches the user's documents and answers the input question from them. Input: a natural-language question."
    }

    async fn call(&self, input: &str) -> Result<String> {
        let result = self
            .rag
            .contextual_search(input, self.top_k, self.allowed_document_ids())
            .await
            .map_err(|e| Error::tool(RETRIEVAL_TOOL_NAME, e.to_string()))?;

        tracing::debug!(
            "{} retrieved {} passages for {:?}",
            RETRIEVAL_TOOL_NAME,
            result.passages.len(),
            input
        );

        Ok(match result.outcome {
            AnswerOutcome::Answered(answer) if answer.is_chat_false => format!(
                "{}\n\n(The knowledge base marked this answer as not supported by the documents.)",
                answer.result
            ),
            AnswerOutcome::Answered(answer) => answer.result,
            AnswerOutcome::NoAnswer { .. } => NO_ANSWER.to_string(),
        })
    }
}
