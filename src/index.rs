//! In-memory vector index.
//!
//! One index per document, never shared across documents. Holds each chunk
//! alongside its embedding vector and answers top-k nearest-neighbor queries
//! by cosine similarity.

use crate::embedding::cosine_similarity;
use crate::models::Chunk;

/// A chunk with its first-stage retrieval score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Flat in-memory vector index over one document's chunks.
#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<(Chunk, Vec<f32>)>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from chunks and their row-aligned vectors.
    pub fn from_entries(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Self {
        debug_assert_eq!(chunks.len(), vectors.len());
        Self {
            entries: chunks.into_iter().zip(vectors).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-k chunks by cosine similarity to the query vector, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|(chunk, vec)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query, vec),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: "doc".to_string(),
            chunk_index: 0,
            text: text.to_string(),
            hash: String::new(),
        }
    }

    #[test]
    fn search_ranks_by_similarity() {
        let index = VectorIndex::from_entries(
            vec![chunk("a", "far"), chunk("b", "near"), chunk("c", "mid")],
            vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]],
        );

        let results = index.search(&[1.0, 0.0], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "b");
        assert_eq!(results[1].chunk.id, "c");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn k_larger_than_index_returns_all() {
        let index = VectorIndex::from_entries(vec![chunk("a", "x")], vec![vec![1.0]]);
        assert_eq!(index.search(&[1.0], 10).len(), 1);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = VectorIndex::new();
        assert!(index.search(&[1.0], 5).is_empty());
    }
}
