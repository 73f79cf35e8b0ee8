use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Optional path to a bundled example report, loadable without an upload.
    #[serde(default)]
    pub example_document: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// First-stage retrieval width (top-k by vector similarity).
    #[serde(default = "default_retriever_k")]
    pub retriever_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            retriever_k: default_retriever_k(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_retriever_k() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// `"llamaparse"` (hosted parsing API) or `"local"` (pdf-extract).
    #[serde(default = "default_extraction_provider")]
    pub provider: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Polling interval while the hosted parser works through a job.
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
    /// Maximum polls before giving up on a parsing job.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider: default_extraction_provider(),
            timeout_secs: default_timeout_secs(),
            poll_secs: default_poll_secs(),
            max_polls: default_max_polls(),
        }
    }
}

fn default_extraction_provider() -> String {
    "local".to_string()
}
fn default_poll_secs() -> u64 {
    2
}
fn default_max_polls() -> u32 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` or `"disabled"`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RerankConfig {
    /// `"cohere"` (hosted cross-encoder) or `"disabled"` (passthrough).
    #[serde(default = "default_rerank_provider")]
    pub provider: String,
    #[serde(default = "default_rerank_model")]
    pub model: String,
    /// Second-stage narrowing: results kept after reranking.
    #[serde(default = "default_rerank_top_n")]
    pub top_n: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            provider: default_rerank_provider(),
            model: default_rerank_model(),
            top_n: default_rerank_top_n(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_rerank_provider() -> String {
    "disabled".to_string()
}
fn default_rerank_model() -> String {
    "rerank-english-v3.0".to_string()
}
fn default_rerank_top_n() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// OpenAI-compatible chat completions base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            temperature: default_temperature(),
            api_base: default_api_base(),
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_temperature() -> f64 {
    0.0
}
fn default_api_base() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketConfig {
    #[serde(default = "default_market_range")]
    pub range: String,
    #[serde(default = "default_market_interval")]
    pub interval: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            range: default_market_range(),
            interval: default_market_interval(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_market_range() -> String {
    "1y".to_string()
}
fn default_market_interval() -> String {
    "1d".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7420".to_string()
}

impl Config {
    /// A default config for tests and commands that can run without a file.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load the config if present, otherwise fall back to defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.pipeline.chunk_size == 0 {
        anyhow::bail!("pipeline.chunk_size must be > 0");
    }
    if config.pipeline.chunk_overlap >= config.pipeline.chunk_size {
        anyhow::bail!("pipeline.chunk_overlap must be < pipeline.chunk_size");
    }
    if config.pipeline.retriever_k < 1 {
        anyhow::bail!("pipeline.retriever_k must be >= 1");
    }

    match config.extraction.provider.as_str() {
        "llamaparse" | "local" => {}
        other => anyhow::bail!(
            "Unknown extraction provider: '{}'. Must be llamaparse or local.",
            other
        ),
    }

    match config.embedding.provider.as_str() {
        "openai" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai or disabled.",
            other
        ),
    }
    if config.embedding.provider == "openai" && config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0 when provider is 'openai'");
    }

    match config.rerank.provider.as_str() {
        "cohere" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown rerank provider: '{}'. Must be cohere or disabled.",
            other
        ),
    }
    if config.rerank.top_n == 0 {
        anyhow::bail!("rerank.top_n must be >= 1");
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}
