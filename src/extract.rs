//! Document text extraction providers.
//!
//! The pipeline hands an extractor a path to a transient copy of the
//! uploaded file and gets back plain or markdown text. Two providers:
//! - **[`LlamaParseExtractor`]** — hosted parsing API (upload, poll the job,
//!   fetch the markdown result). Best fidelity for financial tables.
//! - **[`LocalPdfExtractor`]** — offline `pdf-extract` fallback, no API key
//!   required.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::config::ExtractionConfig;

/// Extraction error: the collaborator could not parse the file. Not retried
/// by the pipeline.
#[derive(Debug)]
pub enum ExtractError {
    /// Malformed or unparseable document.
    Unparseable(String),
    /// The hosted parsing service failed or timed out.
    Service(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Unparseable(e) => write!(f, "document extraction failed: {}", e),
            ExtractError::Service(e) => write!(f, "parsing service error: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Trait for document text extraction providers.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Returns the provider name (`"llamaparse"`, `"local"`).
    fn name(&self) -> &str;

    /// Extract plain or markdown text from the file at `path`.
    async fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

// ============ Local Provider ============

/// Offline PDF text extraction via `pdf-extract`.
pub struct LocalPdfExtractor;

#[async_trait]
impl Extractor for LocalPdfExtractor {
    fn name(&self) -> &str {
        "local"
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path).map_err(|e| ExtractError::Unparseable(e.to_string()))?;
        // pdf-extract is CPU-bound; hop off the async runtime for large files.
        tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| ExtractError::Unparseable(e.to_string()))
        })
        .await
        .map_err(|e| ExtractError::Service(e.to_string()))?
    }
}

// ============ LlamaParse Provider ============

const LLAMAPARSE_BASE: &str = "https://api.cloud.llamaindex.ai/api/v1/parsing";

/// Hosted parsing API client (LlamaParse).
///
/// Requires the `LLAMA_CLOUD_API_KEY` environment variable. The flow is
/// upload → poll job status → fetch markdown result; polling cadence and
/// cap come from [`ExtractionConfig`].
pub struct LlamaParseExtractor {
    client: reqwest::Client,
    base_url: String,
    poll_secs: u64,
    max_polls: u32,
}

impl LlamaParseExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        if std::env::var("LLAMA_CLOUD_API_KEY").is_err() {
            return Err(ExtractError::Service(
                "LLAMA_CLOUD_API_KEY environment variable not set".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractError::Service(e.to_string()))?;

        Ok(Self {
            client,
            base_url: LLAMAPARSE_BASE.to_string(),
            poll_secs: config.poll_secs,
            max_polls: config.max_polls,
        })
    }

    fn api_key(&self) -> Result<String, ExtractError> {
        std::env::var("LLAMA_CLOUD_API_KEY")
            .map_err(|_| ExtractError::Service("LLAMA_CLOUD_API_KEY not set".to_string()))
    }

    async fn upload(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path).map_err(|e| ExtractError::Unparseable(e.to_string()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pdf".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(|e| ExtractError::Service(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("result_type", "markdown");

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .bearer_auth(self.api_key()?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ExtractError::Service(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Service(format!(
                "upload failed with {}: {}",
                status, body
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExtractError::Service(e.to_string()))?;
        json.get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ExtractError::Service("upload response missing job id".to_string()))
    }

    async fn wait_for_job(&self, job_id: &str) -> Result<(), ExtractError> {
        for _ in 0..self.max_polls {
            let response = self
                .client
                .get(format!("{}/job/{}", self.base_url, job_id))
                .bearer_auth(self.api_key()?)
                .send()
                .await
                .map_err(|e| ExtractError::Service(e.to_string()))?;

            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| ExtractError::Service(e.to_string()))?;

            match json.get("status").and_then(|v| v.as_str()) {
                Some("SUCCESS") => return Ok(()),
                Some("ERROR") | Some("CANCELED") => {
                    return Err(ExtractError::Unparseable(format!(
                        "parsing job {} failed",
                        job_id
                    )));
                }
                // PENDING or unknown: keep polling
                _ => tokio::time::sleep(Duration::from_secs(self.poll_secs)).await,
            }
        }
        Err(ExtractError::Service(format!(
            "parsing job {} did not finish after {} polls",
            job_id, self.max_polls
        )))
    }

    async fn fetch_markdown(&self, job_id: &str) -> Result<String, ExtractError> {
        let response = self
            .client
            .get(format!("{}/job/{}/result/markdown", self.base_url, job_id))
            .bearer_auth(self.api_key()?)
            .send()
            .await
            .map_err(|e| ExtractError::Service(e.to_string()))?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExtractError::Service(e.to_string()))?;
        json.get("markdown")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ExtractError::Service("result missing markdown field".to_string()))
    }
}

#[async_trait]
impl Extractor for LlamaParseExtractor {
    fn name(&self) -> &str {
        "llamaparse"
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let job_id = self.upload(path).await?;
        self.wait_for_job(&job_id).await?;
        self.fetch_markdown(&job_id).await
    }
}

/// Create the appropriate [`Extractor`] based on configuration.
pub fn create_extractor(config: &ExtractionConfig) -> Result<Box<dyn Extractor>, ExtractError> {
    match config.provider.as_str() {
        "local" => Ok(Box::new(LocalPdfExtractor)),
        "llamaparse" => Ok(Box::new(LlamaParseExtractor::new(config)?)),
        other => Err(ExtractError::Service(format!(
            "unknown extraction provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_extractor_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        let err = LocalPdfExtractor.extract(&path).await.unwrap_err();
        assert!(matches!(err, ExtractError::Unparseable(_)));
    }

    #[tokio::test]
    async fn local_extractor_missing_file_is_unparseable() {
        let err = LocalPdfExtractor
            .extract(Path::new("/nonexistent/report.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Unparseable(_)));
    }
}
