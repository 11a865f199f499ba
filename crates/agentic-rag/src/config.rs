//! Configuration for the RAG pipeline and agent sessions

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable holding the OpenAI API key
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable forcing a drop-and-recreate of the vector collection
pub const VECTORDB_REINIT_ENV: &str = "RAG_VECTORDB_REINIT";

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Main RAG system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Generative-text service configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// Semantic chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Vector index configuration
    #[serde(default)]
    pub vector_db: VectorDbConfig,
    /// Passage (full-text) store configuration
    #[serde(default)]
    pub passage_store: PassageStoreConfig,
    /// Reranker configuration
    #[serde(default)]
    pub reranker: RerankerConfig,
    /// Retrieval configuration. `top_k` has no file default and must be set.
    pub retrieval: RetrievalConfig,
    /// Answer generation configuration
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Agent session configuration
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            embeddings: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            vector_db: VectorDbConfig::default(),
            passage_store: PassageStoreConfig::default(),
            reranker: RerankerConfig::default(),
            retrieval: RetrievalConfig::new(5),
            generation: GenerationConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl RagConfig {
    /// Load configuration from a TOML file, apply env overrides and validate
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string without env overrides
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply environment overrides (API keys, collection reinit)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(OPENAI_API_KEY_ENV) {
            if self.llm.api_key.is_none() {
                self.llm.api_key = Some(key.clone());
            }
            if self.embeddings.api_key.is_none() {
                self.embeddings.api_key = Some(key);
            }
        }
        if let Ok(flag) = std::env::var(VECTORDB_REINIT_ENV) {
            self.vector_db.reinit = flag.eq_ignore_ascii_case("true");
        }
    }

    /// Validate value ranges and cross-section requirements
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be at least 1"));
        }
        if self.reranker.top_n == 0 {
            return Err(Error::config("reranker.top_n must be at least 1"));
        }
        if self.chunking.buffer_size == 0 {
            return Err(Error::config("chunking.buffer_size must be at least 1"));
        }
        let p = self.chunking.breakpoint_percentile_threshold;
        if !(0.0..=100.0).contains(&p) {
            return Err(Error::config(format!(
                "chunking.breakpoint_percentile_threshold must be within [0, 100], got {}",
                p
            )));
        }
        if self.agent.max_iterations == 0 {
            return Err(Error::config("agent.max_iterations must be at least 1"));
        }
        if self.llm.service == LlmService::OpenAi && self.llm.api_key.is_none() {
            return Err(Error::config(format!(
                "llm.service = \"openai\" requires llm.api_key or {}",
                OPENAI_API_KEY_ENV
            )));
        }
        if self.embeddings.service == EmbedderService::OpenAi && self.embeddings.api_key.is_none()
        {
            return Err(Error::config(format!(
                "embeddings.service = \"openai\" requires embeddings.api_key or {}",
                OPENAI_API_KEY_ENV
            )));
        }
        if self.reranker.service == RerankerService::Http && self.reranker.base_url.is_none() {
            return Err(Error::config(
                "reranker.service = \"http\" requires reranker.base_url",
            ));
        }
        Ok(())
    }
}

/// Generative-text backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmService {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI chat completions
    #[serde(rename = "openai")]
    OpenAi,
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderService {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI embeddings endpoint
    #[serde(rename = "openai")]
    OpenAi,
}

/// Vector index backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorDbService {
    /// In-process brute-force L2 index with optional snapshot file
    #[default]
    Local,
}

/// Passage store backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PassageStoreService {
    /// Process-local map
    #[default]
    Memory,
    /// One JSON file per passage
    Filesystem,
}

/// Reranker backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RerankerService {
    /// Cosine similarity between query and passage embeddings
    #[default]
    Embedding,
    /// Order by preliminary (distance-derived) score only
    Score,
    /// Remote cross-encoder speaking `POST /rerank`
    Http,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend service
    pub service: LlmService,
    /// Base URL of the service; defaults per service
    pub base_url: Option<String>,
    /// Chat model name; defaults per service
    pub model: Option<String>,
    /// API key (OpenAI only)
    pub api_key: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of transport retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            service: LlmService::Ollama,
            base_url: None,
            model: None,
            api_key: None,
            temperature: 0.2,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl LlmConfig {
    /// Configured base URL or the service default
    pub fn base_url(&self) -> &str {
        match (&self.base_url, self.service) {
            (Some(url), _) => url,
            (None, LlmService::Ollama) => DEFAULT_OLLAMA_URL,
            (None, LlmService::OpenAi) => DEFAULT_OPENAI_URL,
        }
    }

    /// Configured model or the service default
    pub fn model(&self) -> &str {
        match (&self.model, self.service) {
            (Some(model), _) => model,
            (None, LlmService::Ollama) => "llama3.2:3b",
            (None, LlmService::OpenAi) => "gpt-4o-mini",
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend service
    pub service: EmbedderService,
    /// Base URL of the service; defaults per service
    pub base_url: Option<String>,
    /// Embedding model name; defaults per service
    pub model: Option<String>,
    /// API key (OpenAI only)
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of transport retries for failed requests
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            service: EmbedderService::Ollama,
            base_url: None,
            model: None,
            api_key: None,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

impl EmbeddingConfig {
    /// Configured base URL or the service default
    pub fn base_url(&self) -> &str {
        match (&self.base_url, self.service) {
            (Some(url), _) => url,
            (None, EmbedderService::Ollama) => DEFAULT_OLLAMA_URL,
            (None, EmbedderService::OpenAi) => DEFAULT_OPENAI_URL,
        }
    }

    /// Configured model or the service default
    pub fn model(&self) -> &str {
        match (&self.model, self.service) {
            (Some(model), _) => model,
            (None, EmbedderService::Ollama) => "nomic-embed-text",
            (None, EmbedderService::OpenAi) => "text-embedding-3-small",
        }
    }
}

/// Semantic chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Sentences grouped into one window before computing similarity
    pub buffer_size: usize,
    /// Percentile of adjacent distances at which a chunk boundary is placed
    pub breakpoint_percentile_threshold: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1,
            breakpoint_percentile_threshold: 90.0,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Backend service
    pub service: VectorDbService,
    /// Collection name
    pub collection: String,
    /// Snapshot file; `None` keeps the index in memory only
    pub storage_path: Option<PathBuf>,
    /// Drop and recreate the collection on open
    pub reinit: bool,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            service: VectorDbService::Local,
            collection: "collection".to_string(),
            storage_path: None,
            reinit: false,
        }
    }
}

/// Passage store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PassageStoreConfig {
    /// Backend service
    pub service: PassageStoreService,
    /// Directory used by the filesystem store
    pub storage_dir: PathBuf,
}

impl Default for PassageStoreConfig {
    fn default() -> Self {
        let storage_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agentic-rag")
            .join("passages");

        Self {
            service: PassageStoreService::Memory,
            storage_dir,
        }
    }
}

/// Reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    /// Backend service
    pub service: RerankerService,
    /// Number of passages kept after reranking
    pub top_n: usize,
    /// Base URL of the rerank service (http only)
    pub base_url: Option<String>,
    /// Rerank model name (http only)
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            service: RerankerService::Embedding,
            top_n: 5,
            base_url: None,
            model: "BAAI/bge-reranker-large".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Nearest passages fetched from the vector index per query
    pub top_k: usize,
    /// `top_k` used by the agent's retrieval tool; falls back to `top_k`
    #[serde(default)]
    pub agent_top_k: Option<usize>,
}

impl RetrievalConfig {
    /// Create a retrieval config with an explicit `top_k`
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            agent_top_k: None,
        }
    }

    /// `top_k` for the agent retrieval tool
    pub fn tool_top_k(&self) -> usize {
        self.agent_top_k.unwrap_or(self.top_k)
    }
}

/// Answer generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Additional generate+parse attempts after the first unparseable answer
    pub max_parse_retries: u32,
    /// Delay between parse retries in milliseconds
    pub retry_backoff_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_parse_retries: 3,
            retry_backoff_ms: 0,
        }
    }
}

impl GenerationConfig {
    /// Total generation attempts per query
    pub fn max_attempts(&self) -> u32 {
        self.max_parse_retries + 1
    }

    /// Backoff between parse retries
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Agent session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Idle time after which a session is evicted (default: 24 hours)
    pub session_ttl_secs: u64,
    /// Interval of the background eviction sweep
    pub sweep_interval_secs: u64,
    /// Maximum reasoning steps per chat turn
    pub max_iterations: usize,
    /// Approximate token budget of the conversation memory
    pub memory_token_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 300,
            max_iterations: 10,
            memory_token_limit: 3000,
        }
    }
}

impl AgentConfig {
    /// Session TTL
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Sweep interval
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
