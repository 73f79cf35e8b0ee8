//! Cross-encoder reranking providers.
//!
//! Second-stage retrieval: reorders the first-stage candidates by a
//! cross-encoder relevance score and narrows the set to `top_n`.
//! - **[`CohereReranker`]** — hosted `/v2/rerank` API.
//! - **[`PassthroughReranker`]** — keeps the first-stage order, truncated to
//!   `top_n`; used when reranking is disabled.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::RerankConfig;
use crate::index::ScoredChunk;

/// Error from the reranking service.
#[derive(Debug)]
pub struct RerankError(pub String);

impl std::fmt::Display for RerankError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rerank failed: {}", self.0)
    }
}

impl std::error::Error for RerankError {}

/// Trait for reranking providers.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Returns the provider name (`"cohere"`, `"disabled"`).
    fn name(&self) -> &str;

    /// Reorder candidates by relevance to `query`; may narrow the set.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
    ) -> Result<Vec<ScoredChunk>, RerankError>;
}

// ============ Passthrough Provider ============

/// Keeps the first-stage similarity order, truncated to `top_n`.
pub struct PassthroughReranker {
    top_n: usize,
}

impl PassthroughReranker {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }
}

#[async_trait]
impl Reranker for PassthroughReranker {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn rerank(
        &self,
        _query: &str,
        mut candidates: Vec<ScoredChunk>,
    ) -> Result<Vec<ScoredChunk>, RerankError> {
        candidates.truncate(self.top_n);
        Ok(candidates)
    }
}

// ============ Cohere Provider ============

const COHERE_RERANK_URL: &str = "https://api.cohere.com/v2/rerank";

/// Hosted cross-encoder reranker (Cohere `/v2/rerank`).
///
/// Requires the `COHERE_API_KEY` environment variable.
pub struct CohereReranker {
    model: String,
    top_n: usize,
    client: reqwest::Client,
}

impl CohereReranker {
    pub fn new(config: &RerankConfig) -> Result<Self, RerankError> {
        if std::env::var("COHERE_API_KEY").is_err() {
            return Err(RerankError(
                "COHERE_API_KEY environment variable not set".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RerankError(e.to_string()))?;

        Ok(Self {
            model: config.model.clone(),
            top_n: config.top_n,
            client,
        })
    }
}

#[async_trait]
impl Reranker for CohereReranker {
    fn name(&self) -> &str {
        "cohere"
    }

    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
    ) -> Result<Vec<ScoredChunk>, RerankError> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let api_key = std::env::var("COHERE_API_KEY")
            .map_err(|_| RerankError("COHERE_API_KEY not set".to_string()))?;

        let documents: Vec<&str> = candidates.iter().map(|c| c.chunk.text.as_str()).collect();
        let body = serde_json::json!({
            "model": self.model,
            "query": query,
            "documents": documents,
            "top_n": self.top_n.min(candidates.len()),
        });

        let response = self
            .client
            .post(COHERE_RERANK_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RerankError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RerankError(format!(
                "Cohere API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RerankError(e.to_string()))?;
        parse_rerank_response(&json, &candidates)
    }
}

/// Map the API's `results[].{index, relevance_score}` back onto the
/// candidate list, best first.
fn parse_rerank_response(
    json: &serde_json::Value,
    candidates: &[ScoredChunk],
) -> Result<Vec<ScoredChunk>, RerankError> {
    let results = json
        .get("results")
        .and_then(|r| r.as_array())
        .ok_or_else(|| RerankError("invalid rerank response: missing results".to_string()))?;

    let mut reordered = Vec::with_capacity(results.len());
    for item in results {
        let index = item
            .get("index")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| RerankError("invalid rerank response: missing index".to_string()))?
            as usize;
        let score = item
            .get("relevance_score")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as f32;

        let candidate = candidates
            .get(index)
            .ok_or_else(|| RerankError(format!("rerank index {} out of range", index)))?;
        reordered.push(ScoredChunk {
            chunk: candidate.chunk.clone(),
            score,
        });
    }
    Ok(reordered)
}

/// Create the appropriate [`Reranker`] based on configuration.
pub fn create_reranker(config: &RerankConfig) -> Result<Box<dyn Reranker>, RerankError> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(PassthroughReranker::new(config.top_n))),
        "cohere" => Ok(Box::new(CohereReranker::new(config)?)),
        other => Err(RerankError(format!("unknown rerank provider: {}", other))),
    }
}
