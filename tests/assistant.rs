//! End-to-end session tests over fake collaborators.
//!
//! Every hosted service (extraction, embedding, reranking, generation) is
//! network-backed in production, so these tests drive the full session —
//! document store, pipeline cache, state machine, post-processor — through
//! deterministic in-process fakes.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use finsight::config::Config;
use finsight::embedding::{Embedder, EmbeddingError};
use finsight::extract::{ExtractError, Extractor};
use finsight::generate::{GenerationError, Generator};
use finsight::models::{ChatRole, Document};
use finsight::pipeline::{Collaborators, PipelineCache};
use finsight::rerank::PassthroughReranker;
use finsight::session::ChatSession;

// ============ Fakes ============

/// Returns a fixed report text; counts extractions so cache tests can
/// assert the build ran exactly once.
struct FakeExtractor {
    text: String,
    calls: Arc<AtomicUsize>,
}

impl FakeExtractor {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    fn name(&self) -> &str {
        "fake"
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        // The pipeline must have staged the bytes to a real transient file.
        assert!(path.exists(), "staged file should exist during extraction");
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

struct FailingExtractor;

#[async_trait]
impl Extractor for FailingExtractor {
    fn name(&self) -> &str {
        "failing"
    }

    async fn extract(&self, _path: &Path) -> Result<String, ExtractError> {
        Err(ExtractError::Unparseable("synthetic parse failure".to_string()))
    }
}

/// Deterministic embedding: a tiny bag-of-bytes vector. Quality is
/// irrelevant; the tests only need stable, repeatable scores.
struct FakeEmbedder;

fn toy_vector(text: &str) -> Vec<f32> {
    let mut v = [0.0f32; 4];
    for (i, b) in text.bytes().enumerate() {
        v[i % 4] += (b as f32) / 255.0;
    }
    v.to_vec()
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-embedder"
    }
    fn dims(&self) -> usize {
        4
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| toy_vector(t)).collect())
    }
}

/// Deterministic generator: answers derive from the prompt, so identical
/// questions against identical pipelines produce identical answers.
struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    fn model_name(&self) -> &str {
        "fake-generator"
    }
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        Ok(format!("echo:{:x}", prompt.len()))
    }
}

/// Always answers with a markdown table so the post-processor has
/// something to chart.
struct TableGenerator;

#[async_trait]
impl Generator for TableGenerator {
    fn model_name(&self) -> &str {
        "table-generator"
    }
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Ok("Here you go:\n\n\
            | Segment | Revenue |\n\
            |---------|---------|\n\
            | Data Center | $47,525 |\n\
            | Gaming | $10,447 |\n"
            .to_string())
    }
}

struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing-generator"
    }
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError("synthetic outage".to_string()))
    }
}

const REPORT_TEXT: &str = "Total revenue for fiscal 2024 was 60922 million dollars.\n\n\
    Data Center revenue was 47525 million dollars.\n\n\
    Gaming revenue was 10447 million dollars.";

fn collaborators_with(extractor: Arc<dyn Extractor>, generator: Arc<dyn Generator>) -> Collaborators {
    Collaborators {
        extractor,
        embedder: Arc::new(FakeEmbedder),
        reranker: Arc::new(PassthroughReranker::new(4)),
        generator,
    }
}

fn session_with(extractor: Arc<dyn Extractor>, generator: Arc<dyn Generator>) -> ChatSession {
    ChatSession::new(Config::minimal(), collaborators_with(extractor, generator))
}

fn pdf_bytes() -> Vec<u8> {
    b"%PDF-fake".to_vec()
}

// ============ State machine ============

#[tokio::test]
async fn first_upload_activates_and_greets() {
    let mut session = session_with(Arc::new(FakeExtractor::new(REPORT_TEXT)), Arc::new(EchoGenerator));
    assert!(session.active_document().is_none());
    assert!(session.transcript().is_empty());

    session.add_document("report.pdf", pdf_bytes());

    assert_eq!(session.active_document(), Some("report.pdf"));
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].role, ChatRole::Assistant);
    assert!(transcript[0].content.contains("report.pdf"));
}

#[tokio::test]
async fn later_uploads_do_not_steal_the_active_document() {
    let mut session = session_with(Arc::new(FakeExtractor::new(REPORT_TEXT)), Arc::new(EchoGenerator));
    session.add_document("first.pdf", pdf_bytes());
    session.add_document("second.pdf", pdf_bytes());

    assert_eq!(session.active_document(), Some("first.pdf"));
    assert_eq!(session.document_names(), vec!["first.pdf", "second.pdf"]);
}

#[tokio::test]
async fn selecting_a_new_document_resets_the_transcript() {
    let mut session = session_with(Arc::new(FakeExtractor::new(REPORT_TEXT)), Arc::new(EchoGenerator));
    session.add_document("a.pdf", pdf_bytes());
    session.add_document("b.pdf", pdf_bytes());

    session.submit_question("What was revenue?").await.unwrap();
    assert_eq!(session.transcript().len(), 3);

    session.select_document("b.pdf").unwrap();
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 1);
    assert!(transcript[0].content.contains("b.pdf"));
}

#[tokio::test]
async fn reselecting_the_active_document_never_resets() {
    let mut session = session_with(Arc::new(FakeExtractor::new(REPORT_TEXT)), Arc::new(EchoGenerator));
    session.add_document("a.pdf", pdf_bytes());
    session.submit_question("What was revenue?").await.unwrap();
    let before = session.transcript().len();

    session.select_document("a.pdf").unwrap();
    assert_eq!(session.transcript().len(), before);
}

#[tokio::test]
async fn selecting_an_unknown_document_fails_without_side_effects() {
    let mut session = session_with(Arc::new(FakeExtractor::new(REPORT_TEXT)), Arc::new(EchoGenerator));
    session.add_document("a.pdf", pdf_bytes());
    let before = session.transcript().len();

    assert!(session.select_document("ghost.pdf").is_err());
    assert_eq!(session.active_document(), Some("a.pdf"));
    assert_eq!(session.transcript().len(), before);
}

#[tokio::test]
async fn question_with_no_active_document_is_rejected_cleanly() {
    let mut session = session_with(Arc::new(FakeExtractor::new(REPORT_TEXT)), Arc::new(EchoGenerator));
    let err = session.submit_question("anyone there?").await.unwrap_err();
    assert!(err.contains("No document is active"));
    assert!(session.transcript().is_empty());
}

// ============ Question flow ============

#[tokio::test]
async fn question_appends_exactly_one_user_and_one_assistant_turn() {
    let mut session = session_with(Arc::new(FakeExtractor::new(REPORT_TEXT)), Arc::new(EchoGenerator));
    session.add_document("report.pdf", pdf_bytes());

    session.submit_question("What was total revenue?").await.unwrap();

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 3); // greeting + user + assistant
    assert_eq!(transcript[1].role, ChatRole::User);
    assert_eq!(transcript[1].content, "What was total revenue?");
    assert_eq!(transcript[2].role, ChatRole::Assistant);
    assert!(!transcript[2].content.is_empty());
    assert!(!transcript[2].sources.is_empty());
}

#[tokio::test]
async fn asking_twice_grows_the_transcript_by_four_without_reset() {
    let mut session = session_with(Arc::new(FakeExtractor::new(REPORT_TEXT)), Arc::new(EchoGenerator));
    session.add_document("report.pdf", pdf_bytes());

    session.submit_question("What was total revenue?").await.unwrap();
    let after_first = session.transcript().len();
    session.submit_question("What was total revenue?").await.unwrap();

    assert_eq!(session.transcript().len(), after_first + 2);
    assert_eq!(session.transcript().len(), 5);

    // Same pipeline, same question: same answer text both times.
    assert_eq!(session.transcript()[2].content, session.transcript()[4].content);
}

#[tokio::test]
async fn extraction_failure_becomes_an_assistant_error_turn() {
    let mut session = session_with(Arc::new(FailingExtractor), Arc::new(EchoGenerator));
    session.add_document("broken.pdf", pdf_bytes());

    session.submit_question("What was revenue?").await.unwrap();

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[2].role, ChatRole::Assistant);
    assert!(transcript[2].content.contains("an error occurred"));
    assert!(transcript[2].content.contains("extraction failed"));
}

#[tokio::test]
async fn generation_failure_does_not_poison_later_questions() {
    // The failed ask leaves the built pipeline cached; only generation
    // failed, so the next question still gets an answer path.
    let extractor = Arc::new(FakeExtractor::new(REPORT_TEXT));
    let calls = extractor.calls.clone();
    let mut session = session_with(extractor, Arc::new(FailingGenerator));
    session.add_document("report.pdf", pdf_bytes());

    session.submit_question("first?").await.unwrap();
    session.submit_question("second?").await.unwrap();

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 5);
    assert!(transcript[2].content.contains("an error occurred"));
    assert!(transcript[4].content.contains("an error occurred"));
    // Build happened once; the failure was downstream of the cache.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tabular_answer_gains_a_chart_table() {
    let mut session = session_with(Arc::new(FakeExtractor::new(REPORT_TEXT)), Arc::new(TableGenerator));
    session.add_document("report.pdf", pdf_bytes());

    let turn = session
        .submit_question("Show revenue by segment as a table")
        .await
        .unwrap();

    let chart = turn.chart.as_ref().expect("table answer should chart");
    assert_eq!(chart.key_header, "Segment");
    assert_eq!(chart.keys, vec!["Data Center", "Gaming"]);
    let values = chart.columns[0].values.as_ref().unwrap();
    assert_eq!(values, &vec![47525.0, 10447.0]);
}

#[tokio::test]
async fn prose_answer_has_no_chart_table() {
    let mut session = session_with(Arc::new(FakeExtractor::new(REPORT_TEXT)), Arc::new(EchoGenerator));
    session.add_document("report.pdf", pdf_bytes());

    let turn = session.submit_question("Summarize the report").await.unwrap();
    assert!(turn.chart.is_none());
}

// ============ Pipeline cache ============

#[tokio::test]
async fn repeated_questions_build_the_pipeline_once() {
    let extractor = Arc::new(FakeExtractor::new(REPORT_TEXT));
    let calls = extractor.calls.clone();
    let mut session = session_with(extractor, Arc::new(EchoGenerator));
    session.add_document("report.pdf", pdf_bytes());

    session.submit_question("one?").await.unwrap();
    session.submit_question("two?").await.unwrap();
    session.submit_question("three?").await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_first_questions_share_a_single_build() {
    let extractor = Arc::new(FakeExtractor::new(REPORT_TEXT));
    let calls = extractor.calls.clone();
    let collaborators = collaborators_with(extractor, Arc::new(EchoGenerator));
    let config = Config::minimal();
    let cache = PipelineCache::new();

    let document = Document {
        name: "report.pdf".to_string(),
        identity: "identity-1".to_string(),
        bytes: pdf_bytes(),
    };

    let (a, b) = tokio::join!(
        cache.get_or_build(&document, &collaborators, &config),
        cache.get_or_build(&document, &collaborators, &config),
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b), "both callers must observe the same build");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.contains("identity-1"));
}

#[tokio::test]
async fn distinct_identities_build_distinct_pipelines() {
    let extractor = Arc::new(FakeExtractor::new(REPORT_TEXT));
    let calls = extractor.calls.clone();
    let collaborators = collaborators_with(extractor, Arc::new(EchoGenerator));
    let config = Config::minimal();
    let cache = PipelineCache::new();

    for identity in ["id-a", "id-b"] {
        let document = Document {
            name: format!("{}.pdf", identity),
            identity: identity.to_string(),
            bytes: pdf_bytes(),
        };
        cache.get_or_build(&document, &collaborators, &config).await.unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rebuilding_the_same_bytes_answers_identically() {
    // Cache equivalence: a fresh build over the same bytes and config must
    // answer the same as the cached pipeline.
    let collaborators = collaborators_with(
        Arc::new(FakeExtractor::new(REPORT_TEXT)),
        Arc::new(EchoGenerator),
    );
    let config = Config::minimal();

    let document = Document {
        name: "report.pdf".to_string(),
        identity: "identity-1".to_string(),
        bytes: pdf_bytes(),
    };

    let first = finsight::pipeline::QaPipeline::build(&document, collaborators.clone(), &config)
        .await
        .unwrap();
    let second = finsight::pipeline::QaPipeline::build(&document, collaborators, &config)
        .await
        .unwrap();

    let question = "What was total revenue?";
    let a = first.ask(question).await.unwrap();
    let b = second.ask(question).await.unwrap();
    assert_eq!(a.text, b.text);
    assert_eq!(a.sources.len(), b.sources.len());
}
