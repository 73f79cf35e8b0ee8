//! Question-answering pipeline and its per-document cache.
//!
//! [`QaPipeline::build`] turns a document's bytes into a ready retriever:
//! extract → chunk → embed → index. [`QaPipeline::ask`] answers a question:
//! embed query → top-k similarity → rerank → generate. Building is expensive
//! (two hosted-service round trips plus parsing), so [`PipelineCache`] keys
//! built pipelines by document identity and guarantees at most one build per
//! identity even under concurrent first calls.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::{Embedder, EmbeddingError};
use crate::extract::{ExtractError, Extractor};
use crate::generate::{build_prompt, GenerationError, Generator};
use crate::index::VectorIndex;
use crate::models::{Answer, Document};
use crate::rerank::{RerankError, Reranker};

/// Any failure on the build or ask path. Surfaced to the caller; the chat
/// boundary renders it as an assistant error turn.
#[derive(Debug)]
pub enum PipelineError {
    Extraction(ExtractError),
    Embedding(EmbeddingError),
    Rerank(RerankError),
    Generation(GenerationError),
    /// Temp-file plumbing around extraction.
    Io(std::io::Error),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Extraction(e) => write!(f, "{}", e),
            PipelineError::Embedding(e) => write!(f, "{}", e),
            PipelineError::Rerank(e) => write!(f, "{}", e),
            PipelineError::Generation(e) => write!(f, "{}", e),
            PipelineError::Io(e) => write!(f, "document staging failed: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ExtractError> for PipelineError {
    fn from(e: ExtractError) -> Self {
        PipelineError::Extraction(e)
    }
}
impl From<EmbeddingError> for PipelineError {
    fn from(e: EmbeddingError) -> Self {
        PipelineError::Embedding(e)
    }
}
impl From<RerankError> for PipelineError {
    fn from(e: RerankError) -> Self {
        PipelineError::Rerank(e)
    }
}
impl From<GenerationError> for PipelineError {
    fn from(e: GenerationError) -> Self {
        PipelineError::Generation(e)
    }
}
impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Io(e)
    }
}

/// The external services the pipeline delegates to. Trait objects so tests
/// can drive the whole session with fakes.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn Extractor>,
    pub embedder: Arc<dyn Embedder>,
    pub reranker: Arc<dyn Reranker>,
    pub generator: Arc<dyn Generator>,
}

impl Collaborators {
    /// Wire up the hosted providers named in the config.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        Ok(Self {
            extractor: Arc::from(crate::extract::create_extractor(&config.extraction)?),
            embedder: Arc::from(crate::embedding::create_embedder(&config.embedding)?),
            reranker: Arc::from(crate::rerank::create_reranker(&config.rerank)?),
            generator: Arc::from(crate::generate::create_generator(&config.generation)?),
        })
    }
}

/// A question-answering pipeline bound to one document.
pub struct QaPipeline {
    index: VectorIndex,
    collaborators: Collaborators,
    retriever_k: usize,
}

impl QaPipeline {
    /// Build the pipeline for a document: stage bytes to a transient file,
    /// extract, chunk, embed, index.
    ///
    /// The staged file is a `NamedTempFile`, removed on every exit path —
    /// success, extraction failure, or panic — when the guard drops.
    pub async fn build(
        document: &Document,
        collaborators: Collaborators,
        config: &Config,
    ) -> Result<Self, PipelineError> {
        let mut staged = tempfile::Builder::new().suffix(".pdf").tempfile()?;
        staged.write_all(&document.bytes)?;
        staged.flush()?;

        let text = collaborators.extractor.extract(staged.path()).await?;
        drop(staged);

        let chunks = chunk_text(
            &document.identity,
            &text,
            config.pipeline.chunk_size,
            config.pipeline.chunk_overlap,
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = collaborators.embedder.embed(&texts).await?;

        Ok(Self {
            index: VectorIndex::from_entries(chunks, vectors),
            collaborators,
            retriever_k: config.pipeline.retriever_k,
        })
    }

    /// Answer a question against this document.
    pub async fn ask(&self, question: &str) -> Result<Answer, PipelineError> {
        let query_vec = self.collaborators.embedder.embed_query(question).await?;
        let candidates = self.index.search(&query_vec, self.retriever_k);
        let reranked = self
            .collaborators
            .reranker
            .rerank(question, candidates)
            .await?;

        let context = reranked
            .iter()
            .map(|c| c.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = build_prompt(&context, question);
        let text = self.collaborators.generator.generate(&prompt).await?;

        Ok(Answer {
            text,
            sources: reranked.into_iter().map(|c| c.chunk).collect(),
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.index.len()
    }
}

/// Identity-keyed cache of built pipelines.
///
/// An explicit map of per-identity `OnceCell`s: the first caller for an
/// identity runs the build, concurrent callers for the same identity await
/// that build and share its result. Entries live for the session and are
/// never invalidated — a document's identity is fixed at upload, so its
/// bytes cannot change underneath the cache.
#[derive(Default)]
pub struct PipelineCache {
    cells: Mutex<HashMap<String, Arc<OnceCell<Arc<QaPipeline>>>>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the pipeline for `document`, building it on first use.
    ///
    /// A failed build leaves the cell empty, so the next question retries
    /// instead of caching the failure.
    pub async fn get_or_build(
        &self,
        document: &Document,
        collaborators: &Collaborators,
        config: &Config,
    ) -> Result<Arc<QaPipeline>, PipelineError> {
        let cell = {
            let mut cells = self.cells.lock().expect("pipeline cache poisoned");
            cells
                .entry(document.identity.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let pipeline = cell
            .get_or_try_init(|| async {
                QaPipeline::build(document, collaborators.clone(), config)
                    .await
                    .map(Arc::new)
            })
            .await?;

        Ok(pipeline.clone())
    }

    /// Whether a pipeline has been built for this identity.
    pub fn contains(&self, identity: &str) -> bool {
        self.cells
            .lock()
            .expect("pipeline cache poisoned")
            .get(identity)
            .map(|cell| cell.initialized())
            .unwrap_or(false)
    }
}
