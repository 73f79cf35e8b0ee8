//! Chat session state machine.
//!
//! Tracks which document is active, keeps the ordered transcript for that
//! document, and resets the transcript with a greeting whenever the active
//! document changes. The transition guard compares the previous and new
//! active names explicitly — reselecting the current document is a no-op.
//!
//! All transcript mutation happens here and is append-only apart from the
//! greeting reset; a question appends exactly one user turn followed by
//! exactly one assistant turn (answer or readable error).

use std::path::Path;

use crate::config::Config;
use crate::models::{ChatTurn, Document};
use crate::pipeline::{Collaborators, PipelineCache};
use crate::postprocess::postprocess;
use crate::store::DocumentStore;

/// One user's session: documents, active-document pointer, transcript, and
/// the pipeline cache. Lives for the process lifetime; nothing persists.
pub struct ChatSession {
    store: DocumentStore,
    active: Option<String>,
    transcript: Vec<ChatTurn>,
    cache: PipelineCache,
    collaborators: Collaborators,
    config: Config,
}

impl ChatSession {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        Self {
            store: DocumentStore::new(),
            active: None,
            transcript: Vec::new(),
            cache: PipelineCache::new(),
            collaborators,
            config,
        }
    }

    /// Add an uploaded document. The first document added while nothing is
    /// active becomes active (with the greeting reset); later uploads leave
    /// the active document alone.
    pub fn add_document(&mut self, name: &str, bytes: Vec<u8>) {
        self.store.insert(name, bytes);
        if self.active.is_none() {
            if let Some(first) = self.store.first_name().map(|s| s.to_string()) {
                self.activate(&first);
            }
        }
    }

    /// Load the bundled example report from disk and activate it.
    pub fn load_example(&mut self) -> Result<String, String> {
        let path = self
            .config
            .example_document
            .clone()
            .ok_or_else(|| "No example document is configured.".to_string())?;
        let bytes = std::fs::read(&path).map_err(|_| {
            format!(
                "Example file '{}' not found. Please add it to your project folder.",
                path.display()
            )
        })?;
        let name = Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "example.pdf".to_string());

        self.store.insert(&name, bytes);
        self.select_document(&name)?;
        Ok(name)
    }

    /// Make `name` the active document. Changing the active document resets
    /// the transcript to a single greeting turn; reselecting the current one
    /// changes nothing.
    pub fn select_document(&mut self, name: &str) -> Result<(), String> {
        if !self.store.contains(name) {
            return Err(format!("Unknown document: {}", name));
        }
        if self.active.as_deref() == Some(name) {
            return Ok(());
        }
        self.activate(name);
        Ok(())
    }

    fn activate(&mut self, name: &str) {
        self.active = Some(name.to_string());
        self.transcript = vec![ChatTurn::assistant(format!(
            "I've finished reading **{}**! What financial insights can I help you with?",
            name
        ))];
    }

    /// Submit a question against the active document.
    ///
    /// Appends the user turn immediately, then either the assistant answer
    /// (with chart table and sources when present) or an assistant error
    /// turn. Errors never escape; the transcript always gains exactly two
    /// turns. Returns an error only when no document is active, in which
    /// case the transcript is untouched.
    pub async fn submit_question(&mut self, question: &str) -> Result<&ChatTurn, String> {
        let active = self
            .active
            .clone()
            .ok_or_else(|| "No document is active. Upload or select one first.".to_string())?;

        self.transcript.push(ChatTurn::user(question));

        let turn = match self.answer(&active, question).await {
            Ok(turn) => turn,
            Err(message) => ChatTurn::assistant(format!("Oh no, an error occurred: {}", message)),
        };
        self.transcript.push(turn);

        Ok(self.transcript.last().expect("turn just pushed"))
    }

    async fn answer(&self, active: &str, question: &str) -> Result<ChatTurn, String> {
        let document: &Document = self
            .store
            .get(active)
            .ok_or_else(|| format!("Unknown document: {}", active))?;

        let pipeline = self
            .cache
            .get_or_build(document, &self.collaborators, &self.config)
            .await
            .map_err(|e| e.to_string())?;

        let answer = pipeline.ask(question).await.map_err(|e| e.to_string())?;
        let processed = postprocess(&answer.text);

        Ok(ChatTurn {
            role: crate::models::ChatRole::Assistant,
            content: processed.text,
            chart: processed.chart,
            sources: answer.sources,
        })
    }

    pub fn active_document(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    pub fn document_names(&self) -> Vec<String> {
        self.store.names()
    }

    pub fn has_documents(&self) -> bool {
        !self.store.is_empty()
    }
}
