//! Threshold-gated semantic retrieval over stored chunks
//!
//! Brute-force cosine scan. Corpus sizes here are policy libraries, not web
//! indexes; a linear pass over a few thousand vectors beats maintaining an
//! ANN index.

use tracing::debug;

use crate::ai::{cosine_similarity, EmbeddingClient};
use crate::db::{ChunkRecord, Database};
use crate::error::AppError;

/// Strict gate for user-facing answers: below this, say so rather than guess.
pub const GROUNDING_THRESHOLD: f32 = 0.50;

/// Loose gate for policy-to-control mapping, where a weak lead is still
/// worth surfacing to a reviewer.
pub const MAPPING_THRESHOLD: f32 = 0.25;

#[derive(Debug, Clone)]
pub struct ChunkMatch {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    pub similarity: f32,
}

impl ChunkMatch {
    /// Similarity as a 0-100 confidence score
    pub fn confidence(&self) -> i64 {
        (self.similarity * 100.0).round() as i64
    }
}

/// Rank chunks against a query embedding: filter by threshold, best first,
/// truncated to `top_k`.
pub fn rank_chunks(
    query_embedding: &[f32],
    chunks: &[ChunkRecord],
    threshold: f32,
    top_k: usize,
) -> Vec<ChunkMatch> {
    let mut matches: Vec<ChunkMatch> = chunks
        .iter()
        .filter_map(|chunk| {
            let similarity = cosine_similarity(query_embedding, &chunk.embedding);
            if similarity >= threshold {
                Some(ChunkMatch {
                    chunk_id: chunk.id.clone(),
                    document_id: chunk.document_id.clone(),
                    content: chunk.content.clone(),
                    similarity,
                })
            } else {
                None
            }
        })
        .collect();

    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(top_k);
    matches
}

pub struct Retriever<'a> {
    db: &'a Database,
    embedder: &'a dyn EmbeddingClient,
}

impl<'a> Retriever<'a> {
    pub fn new(db: &'a Database, embedder: &'a dyn EmbeddingClient) -> Self {
        Self { db, embedder }
    }

    pub async fn search(
        &self,
        query: &str,
        threshold: f32,
        top_k: usize,
    ) -> Result<Vec<ChunkMatch>, AppError> {
        if query.trim().is_empty() {
            return Err(AppError::empty_input("query"));
        }

        let query_embedding = self.embedder.embed(query).await?;
        let chunks = self.db.all_chunks_with_embeddings()?;
        let matches = rank_chunks(&query_embedding, &chunks, threshold, top_k);

        debug!(
            candidates = chunks.len(),
            hits = matches.len(),
            threshold,
            "retrieval scan"
        );
        Ok(matches)
    }
}
