//! Core data models used throughout Finsight.
//!
//! These types represent the documents, chunks, chat turns, and market data
//! that flow through the question-answering and snapshot paths.

use chrono::NaiveDate;
use serde::Serialize;

/// An uploaded (or example) document held for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct Document {
    /// Display name, unique among currently-known documents.
    pub name: String,
    /// Stable token for this exact upload instance; the pipeline cache key.
    pub identity: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

/// A bounded slice of a document's extracted text; the unit of retrieval.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// Who produced a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry in the chat transcript.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    /// Present when the answer contained a chart-eligible table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartTable>,
    /// Retrieved chunks that supported an assistant answer.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Chunk>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            chart: None,
            sources: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            chart: None,
            sources: Vec::new(),
        }
    }
}

/// A parsed tabular answer that can be rendered directly as a bar chart.
///
/// Keyed by its first column: `keys` holds the category labels and each
/// [`ChartColumn`] holds one remaining column. The second original column is
/// guaranteed numeric; others keep their display text either way.
#[derive(Debug, Clone, Serialize)]
pub struct ChartTable {
    pub key_header: String,
    pub keys: Vec<String>,
    pub columns: Vec<ChartColumn>,
}

/// One non-key column of a [`ChartTable`].
#[derive(Debug, Clone, Serialize)]
pub struct ChartColumn {
    pub header: String,
    /// Cell text, row-aligned with `ChartTable::keys`.
    pub cells: Vec<String>,
    /// Parsed values when every cell in this column is numeric.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
}

/// The pipeline's response to one question.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Chunk>,
}

/// One day of OHLC price history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// A ticker's candlestick view: one year of daily bars plus a chart title.
///
/// Failures degrade to empty `bars` with a placeholder `title`; callers never
/// see an error from the snapshot path.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub ticker: String,
    pub title: String,
    pub bars: Vec<PriceBar>,
}

impl MarketSnapshot {
    pub fn has_data(&self) -> bool {
        !self.bars.is_empty()
    }
}
