//! Stub providers shared by the integration tests

#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agentic_rag::config::RetrievalConfig;
use agentic_rag::providers::{
    EmbeddingProvider, EmbeddingReranker, LlmProvider, LocalVectorIndex, MemoryPassageStore,
    PassageStore, ProviderSet, VectorEntryRef, VectorIndex,
};
use agentic_rag::types::{ChatMessage, RetrievalCandidate, StoredPassage};
use agentic_rag::{ContextualRag, Error, RagConfig, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

pub const DIMENSIONS: usize = 1024;

const STOPWORDS: &[&str] = &["a", "an", "the", "is", "are", "what", "of", "to", "and"];

/// Bag-of-words embedder: hashed word counts, L2-normalized
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .map(|w| w.to_lowercase())
            .filter(|w| !w.is_empty() && !STOPWORDS.contains(&w.as_str()))
        {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            v[(hasher.finish() % DIMENSIONS as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// [`HashEmbedder`] that counts every text it embeds
#[derive(Default)]
pub struct CountingEmbedder {
    pub texts: AtomicUsize,
}

impl CountingEmbedder {
    pub fn count(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.texts.fetch_add(1, Ordering::SeqCst);
        Ok(HashEmbedder::vector(text))
    }

    fn name(&self) -> &str {
        "counting-hash"
    }
}

pub fn fenced_answer(result: &str) -> String {
    format!(
        "Here you go:\n```json\n{{\"result\": \"{}\", \"is_chat_false\": false}}\n```",
        result
    )
}

/// LLM stub that routes on prompt shape: contextualization, QA, or agent step
pub struct StubLlm {
    pub context_reply: String,
    pub fail_contextualize: bool,
    qa_replies: Mutex<VecDeque<String>>,
    pub default_qa: String,
    agent_replies: Mutex<VecDeque<String>>,
    pub contextualize_calls: AtomicUsize,
    pub qa_calls: AtomicUsize,
    pub agent_calls: AtomicUsize,
    pub qa_prompts: Mutex<Vec<String>>,
    pub agent_prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl StubLlm {
    pub fn new() -> Self {
        Self {
            context_reply: "Facts about the colours of things.".to_string(),
            fail_contextualize: false,
            qa_replies: Mutex::new(VecDeque::new()),
            default_qa: fenced_answer("Grass is green."),
            agent_replies: Mutex::new(VecDeque::new()),
            contextualize_calls: AtomicUsize::new(0),
            qa_calls: AtomicUsize::new(0),
            agent_calls: AtomicUsize::new(0),
            qa_prompts: Mutex::new(Vec::new()),
            agent_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_contextualize() -> Self {
        Self {
            fail_contextualize: true,
            ..Self::new()
        }
    }

    pub fn with_qa_replies(self, replies: &[&str]) -> Self {
        *self.qa_replies.lock() = replies.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_default_qa(mut self, reply: &str) -> Self {
        self.default_qa = reply.to_string();
        self
    }

    pub fn with_agent_replies(self, replies: &[&str]) -> Self {
        *self.agent_replies.lock() = replies.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn qa_calls(&self) -> usize {
        self.qa_calls.load(Ordering::SeqCst)
    }

    pub fn contextualize_calls(&self) -> usize {
        self.contextualize_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let user = messages
            .iter()
            .rev()
            .find(|m| m.role == agentic_rag::types::Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let system = messages.first().map(|m| m.content.as_str()).unwrap_or_default();

        if system.contains("must always use the provided tools") {
            self.agent_calls.fetch_add(1, Ordering::SeqCst);
            self.agent_prompts.lock().push(messages.to_vec());
            return Ok(self
                .agent_replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| "Answer: done".to_string()));
        }

        if user.contains("<document>") {
            self.contextualize_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_contextualize {
                return Err(Error::llm("contextualization unavailable"));
            }
            return Ok(self.context_reply.clone());
        }

        self.qa_calls.fetch_add(1, Ordering::SeqCst);
        self.qa_prompts.lock().push(user);
        Ok(self
            .qa_replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_qa.clone()))
    }

    fn name(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub"
    }
}

/// Passage store that fails every `put` after the first `succeed` calls
pub struct FailingPassageStore {
    inner: MemoryPassageStore,
    succeed: usize,
    puts: AtomicUsize,
}

impl FailingPassageStore {
    pub fn after(succeed: usize) -> Self {
        Self {
            inner: MemoryPassageStore::new(),
            succeed,
            puts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PassageStore for FailingPassageStore {
    async fn put(&self, passage: &StoredPassage) -> Result<()> {
        if self.puts.fetch_add(1, Ordering::SeqCst) >= self.succeed {
            return Err(Error::passage_store("disk full"));
        }
        self.inner.put(passage).await
    }

    async fn get(&self, id: &str) -> Result<Option<StoredPassage>> {
        self.inner.get(id).await
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        self.inner.delete(ids).await
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        self.inner.delete_by_document(document_id).await
    }

    async fn entries(&self) -> Result<Vec<(String, String)>> {
        self.inner.entries().await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Local index that snapshots after every upsert, as a concurrent writer would
pub struct EagerFlushIndex(pub LocalVectorIndex);

#[async_trait]
impl VectorIndex for EagerFlushIndex {
    async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        self.0.ensure_collection(dimension).await
    }

    fn dimension(&self) -> Option<usize> {
        self.0.dimension()
    }

    async fn upsert(&self, id: &str, document_id: &str, embedding: &[f32]) -> Result<()> {
        self.0.upsert(id, document_id, embedding).await?;
        self.0.flush().await
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        document_filter: Option<&[String]>,
    ) -> Result<Vec<RetrievalCandidate>> {
        self.0.search(query_embedding, k, document_filter).await
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        self.0.delete(ids).await
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        self.0.delete_by_document(document_id).await
    }

    async fn entries(&self) -> Result<Vec<VectorEntryRef>> {
        self.0.entries().await
    }

    async fn flush(&self) -> Result<()> {
        self.0.flush().await
    }

    async fn len(&self) -> Result<usize> {
        self.0.len().await
    }

    fn name(&self) -> &str {
        "eager-flush"
    }
}

pub fn test_config(top_k: usize) -> RagConfig {
    let mut config = RagConfig::default();
    config.retrieval = RetrievalConfig::new(top_k);
    config.generation.retry_backoff_ms = 0;
    config
}

pub fn providers(llm: Arc<StubLlm>, passage_store: Arc<dyn PassageStore>) -> ProviderSet {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder);
    let vector_index: Arc<dyn VectorIndex> = Arc::new(LocalVectorIndex::in_memory("collection"));
    ProviderSet {
        reranker: Arc::new(EmbeddingReranker::new(Arc::clone(&embedder), 5)),
        embedder,
        llm,
        vector_index,
        passage_store,
    }
}

pub fn rag(llm: Arc<StubLlm>) -> ContextualRag {
    rag_with_store(llm, Arc::new(MemoryPassageStore::new()))
}

pub fn rag_with_store(llm: Arc<StubLlm>, store: Arc<dyn PassageStore>) -> ContextualRag {
    ContextualRag::with_providers(providers(llm, store), &test_config(2))
}

/// Pipeline over explicit embedder, vector index and passage store
pub fn rag_with(
    llm: Arc<StubLlm>,
    embedder: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
    passage_store: Arc<dyn PassageStore>,
) -> ContextualRag {
    let providers = ProviderSet {
        reranker: Arc::new(EmbeddingReranker::new(Arc::clone(&embedder), 5)),
        embedder,
        llm,
        vector_index,
        passage_store,
    };
    ContextualRag::with_providers(providers, &test_config(2))
}
