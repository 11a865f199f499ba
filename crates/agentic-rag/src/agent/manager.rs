//! Per-conversation agent session manager

use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::{AgentConfig, RagConfig};
use crate::error::{Error, Result};
use crate::retrieval::ContextualRag;
use crate::types::{ChatMessage, ContextualSearchResult, Document, IndexedPassage, Role};

use super::memory::ChatMemoryBuffer;
use super::react::ReActAgent;
use super::session::{Session, SessionRegistry, SweeperHandle};
use super::tool::{RetrievalTool, Tool};

/// Materializes one tool-using agent per conversation over a shared pipeline
///
/// Sessions are created by [`ensure_session`](Self::ensure_session), used by
/// [`chat`](Self::chat) and evicted after `agent.session_ttl_secs` of
/// inactivity by a background sweeper.
pub struct AgenticRag {
    rag: Arc<ContextualRag>,
    registry: Arc<SessionRegistry>,
    config: AgentConfig,
    tool_top_k: usize,
    instructions: Option<String>,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl AgenticRag {
    /// Build the pipeline from configuration and start the eviction sweeper.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(config: &RagConfig) -> Result<Self> {
        let rag = Arc::new(ContextualRag::new(config)?);
        let manager = Self::with_rag(rag, &config.agent);
        manager.start_sweeper();
        Ok(manager)
    }

    /// Build a manager over an existing pipeline without starting the sweeper
    pub fn with_rag(rag: Arc<ContextualRag>, config: &AgentConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new(config.session_ttl()));
        Self::with_registry(rag, registry, config)
    }

    /// Build a manager over an injected session registry
    pub fn with_registry(
        rag: Arc<ContextualRag>,
        registry: Arc<SessionRegistry>,
        config: &AgentConfig,
    ) -> Self {
        let tool_top_k = rag.retrieval_config().tool_top_k();
        Self {
            rag,
            registry,
            config: config.clone(),
            tool_top_k,
            instructions: None,
            sweeper: Mutex::new(None),
        }
    }

    /// Extra instructions appended to every new session's directive
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Start the periodic eviction task if it is not running
    pub fn start_sweeper(&self) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_none() {
            *sweeper = Some(self.registry.start_sweeper(self.config.sweep_interval()));
        }
    }

    pub fn rag(&self) -> &Arc<ContextualRag> {
        &self.rag
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    fn build_session(
        &self,
        conversation_id: &str,
        allowed_document_ids: Option<Vec<String>>,
        prior_history: Vec<ChatMessage>,
    ) -> Result<Session> {
        if conversation_id.trim().is_empty() {
            return Err(Error::SessionBuild("conversation id is empty".to_string()));
        }
        if let Some(message) = prior_history.iter().find(|m| m.role == Role::System) {
            return Err(Error::SessionBuild(format!(
                "prior history may only hold user and assistant messages, found system message {:?}",
                message.content
            )));
        }

        let tool: Arc<dyn Tool> = Arc::new(RetrievalTool::new(
            Arc::clone(&self.rag),
            allowed_document_ids.clone(),
            self.tool_top_k,
        ));
        let memory = ChatMemoryBuffer::with_history(prior_history, self.config.memory_token_limit);
        let agent = ReActAgent::new(
            Arc::clone(&self.rag.providers().llm),
            vec![tool],
            memory,
            self.instructions.as_deref(),
            self.config.max_iterations,
        );

        Ok(Session::new(conversation_id, agent, allowed_document_ids))
    }

    /// Create (or replace) the session for `conversation_id`.
    ///
    /// The new session is fully built before it is published; on failure any
    /// existing session is left as it was.
    pub fn ensure_session(
        &self,
        conversation_id: &str,
        allowed_document_ids: Option<Vec<String>>,
        prior_history: Vec<ChatMessage>,
    ) -> Result<()> {
        let session = self.build_session(conversation_id, allowed_document_ids, prior_history)?;
        let replaced = self.registry.insert(session).is_some();
        tracing::info!(
            "{} agent session for conversation {}",
            if replaced { "Replaced" } else { "Created" },
            conversation_id
        );
        Ok(())
    }

    /// Run one user turn in the conversation's session.
    ///
    /// Returns [`Error::SessionNotFound`] if no live session exists.
    pub async fn chat(&self, conversation_id: &str, query: &str) -> Result<String> {
        let session = self
            .registry
            .get(conversation_id)
            .ok_or_else(|| Error::SessionNotFound(conversation_id.to_string()))?;

        session.touch();
        let reply = {
            let mut agent = session.agent().await;
            agent.chat(query).await
        };
        session.touch();
        reply
    }

    /// Evict idle sessions now, returning how many were removed
    pub fn sweep_idle(&self) -> usize {
        self.registry.sweep_idle().len()
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn has_session(&self, conversation_id: &str) -> bool {
        self.registry.contains(conversation_id)
    }

    pub fn remove_session(&self, conversation_id: &str) -> bool {
        self.registry.remove(conversation_id)
    }

    /// Index a document into the shared pipeline
    pub async fn add_document(
        &self,
        doc_id: &str,
        document: &Document,
    ) -> Result<Vec<IndexedPassage>> {
        self.rag.add_document(doc_id, document).await
    }

    /// One-shot contextual search outside any session
    pub async fn contextual_search(
        &self,
        query: &str,
        allowed_document_ids: Option<&[String]>,
    ) -> Result<ContextualSearchResult> {
        self.rag.search(query, allowed_document_ids).await
    }

    /// Stop the sweeper and wait for it to exit
    pub async fn shutdown(&self) {
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }
}
