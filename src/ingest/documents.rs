//! Policy document ingestion pipeline
//!
//! Extract, chunk, embed, store. A document is visible as Processing while
//! the pipeline runs, and transitions to Ready only after every chunk row
//! has committed. Any failure flips it to Failed so a stuck Processing row
//! never lingers.

use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ai::EmbeddingClient;
use crate::chunker::smart_split;
use crate::db::{now_rfc3339, ChunkRecord, Database, Document, DocumentStatus};
use crate::error::AppError;
use crate::extract::extract_text;

pub const CHUNK_SIZE: usize = 1000;
pub const CHUNK_OVERLAP: usize = 200;

/// Fragments below this length (usually overlap tails) are not worth a
/// vector of their own.
pub const MIN_CHUNK_LENGTH: usize = 50;

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub document_id: String,
    pub chunk_count: usize,
}

pub struct DocumentIngestor<'a> {
    db: &'a Database,
    embedder: &'a dyn EmbeddingClient,
}

impl<'a> DocumentIngestor<'a> {
    pub fn new(db: &'a Database, embedder: &'a dyn EmbeddingClient) -> Self {
        Self { db, embedder }
    }

    /// Ingest a document file from disk
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestSummary, AppError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let size_bytes = std::fs::metadata(path).map(|m| m.len() as i64).unwrap_or(0);

        let document_id = Uuid::new_v4().to_string();
        self.db.insert_document(&Document {
            id: document_id.clone(),
            name: name.clone(),
            status: DocumentStatus::Processing,
            chunk_count: 0,
            size_bytes,
            created_at: now_rfc3339(),
        })?;

        let text = match extract_text(path) {
            Ok(t) => t,
            Err(e) => {
                self.db
                    .set_document_status(&document_id, DocumentStatus::Failed)?;
                return Err(e.into());
            }
        };

        match self.index_text(&document_id, &text).await {
            Ok(chunk_count) => {
                info!(document = %name, chunks = chunk_count, "document ingested");
                Ok(IngestSummary {
                    document_id,
                    chunk_count,
                })
            }
            Err(e) => {
                warn!(document = %name, error = %e, "ingestion failed");
                self.db
                    .set_document_status(&document_id, DocumentStatus::Failed)?;
                Err(e)
            }
        }
    }

    /// Ingest already-extracted text under an existing Processing document row
    pub async fn index_text(&self, document_id: &str, text: &str) -> Result<usize, AppError> {
        let chunks: Vec<String> = smart_split(text, CHUNK_SIZE, CHUNK_OVERLAP)
            .into_iter()
            .filter(|c| c.trim().len() >= MIN_CHUNK_LENGTH)
            .collect();

        if chunks.is_empty() {
            return Err(AppError::extraction_empty(document_id));
        }

        // Sequential embedding keeps upstream rate limits simple; one bad
        // chunk aborts the whole document before anything is written.
        let mut records = Vec::with_capacity(chunks.len());
        for (index, content) in chunks.into_iter().enumerate() {
            let embedding = self.embedder.embed(&content).await?;
            records.push(ChunkRecord {
                id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                chunk_index: index as i64,
                content,
                embedding,
            });
        }

        let count = self.db.insert_chunks(&records)?;
        self.db.mark_document_ready(document_id, count as i64)?;
        Ok(count)
    }
}
