//! Overlapping text chunker.
//!
//! Splits extracted document text into [`Chunk`]s of at most `chunk_size`
//! characters with `overlap` characters shared between consecutive chunks.
//! Split points are snapped back to the nearest whitespace so tokens are not
//! cut mid-word.
//!
//! Each chunk receives a SHA-256 hash of its text, so chunking is fully
//! deterministic for a given document id and input text.

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Split text into overlapping chunks. Returns chunks with contiguous
/// indices starting at 0; empty or whitespace-only text yields one chunk.
pub fn chunk_text(document_id: &str, text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    assert!(chunk_size > 0, "chunk_size must be > 0");
    assert!(overlap < chunk_size, "overlap must be < chunk_size");

    let text = text.trim();
    if text.len() <= chunk_size {
        return vec![make_chunk(document_id, 0, text)];
    }

    let bytes = text.as_bytes();
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_index: i64 = 0;

    while start < text.len() {
        let hard_end = (start + chunk_size).min(text.len());
        let end = if hard_end < text.len() {
            // Snap back to a whitespace boundary when one exists in the window.
            match find_break(bytes, start, hard_end) {
                Some(pos) => pos,
                None => floor_char_boundary(text, hard_end),
            }
        } else {
            hard_end
        };

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            chunks.push(make_chunk(document_id, chunk_index, piece));
            chunk_index += 1;
        }

        if end >= text.len() {
            break;
        }

        // Step forward, re-covering `overlap` characters of the previous chunk.
        let next = end.saturating_sub(overlap).max(start + 1);
        start = ceil_char_boundary(text, next);
    }

    if chunks.is_empty() {
        chunks.push(make_chunk(document_id, 0, text));
    }

    chunks
}

/// Last whitespace position in `(start, hard_end]`, or `None` when the
/// window contains a single unbroken run.
fn find_break(bytes: &[u8], start: usize, hard_end: usize) -> Option<usize> {
    bytes[start..hard_end]
        .iter()
        .rposition(|b| b.is_ascii_whitespace())
        .filter(|&pos| pos > 0)
        .map(|pos| start + pos + 1)
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

fn make_chunk(document_id: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: format!("{}:{}", document_id, index),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
