//! Policy-to-control mapping
//!
//! Given a control's requirement text, find the policy paragraph most likely
//! to satisfy it and attach it as Pending evidence for human review.

use tracing::info;
use uuid::Uuid;

use crate::ai::EmbeddingClient;
use crate::db::{now_rfc3339, Database, Evidence, EvidenceSource, EvidenceStatus};
use crate::error::AppError;
use crate::retrieve::{ChunkMatch, Retriever, MAPPING_THRESHOLD};

const MAPPING_TOP_K: usize = 5;

/// Result of scanning the policy library for one control
#[derive(Debug, Clone)]
pub enum MapOutcome {
    /// Best paragraph above the mapping gate
    Found(PolicyMatch),
    /// Nothing in the library clears even the loose gate
    NotFound,
}

#[derive(Debug, Clone)]
pub struct PolicyMatch {
    pub document_name: String,
    pub snippet: String,
    pub confidence: i64,
}

pub struct PolicyMapper<'a> {
    db: &'a Database,
    embedder: &'a dyn EmbeddingClient,
}

impl<'a> PolicyMapper<'a> {
    pub fn new(db: &'a Database, embedder: &'a dyn EmbeddingClient) -> Self {
        Self { db, embedder }
    }

    /// Scan the policy library for the control's requirement text
    pub async fn map_control(&self, control_id: &str) -> Result<MapOutcome, AppError> {
        let control = self.db.get_control(control_id)?;

        let retriever = Retriever::new(self.db, self.embedder);
        let matches = retriever
            .search(&control.description, MAPPING_THRESHOLD, MAPPING_TOP_K)
            .await?;

        let Some(best) = matches.into_iter().next() else {
            info!(control = %control.control_code, "no policy match found");
            return Ok(MapOutcome::NotFound);
        };

        info!(
            control = %control.control_code,
            similarity = best.similarity,
            "policy match found"
        );
        Ok(MapOutcome::Found(self.describe_match(&best)?))
    }

    /// Persist a policy match as Pending evidence, returning the new row
    pub fn attach_evidence(
        &self,
        control_id: &str,
        policy_match: &PolicyMatch,
    ) -> Result<Evidence, AppError> {
        let evidence = Evidence {
            id: Uuid::new_v4().to_string(),
            control_id: control_id.to_string(),
            name: policy_match.document_name.clone(),
            source_type: EvidenceSource::PolicyAi,
            // Pending until a human reviews the mapped paragraph
            status: EvidenceStatus::Pending,
            url: None,
            snippet: Some(policy_match.snippet.clone()),
            ai_feedback: Some(format!(
                "AI matched this policy section with {}% similarity.",
                policy_match.confidence
            )),
            confidence_score: Some(policy_match.confidence),
            created_at: now_rfc3339(),
        };
        self.db.insert_evidence(&evidence)?;
        Ok(evidence)
    }

    /// Resolve the owning document's display name; a dangling chunk still
    /// yields a usable match under a placeholder name.
    fn describe_match(&self, best: &ChunkMatch) -> Result<PolicyMatch, AppError> {
        let document_name = self
            .db
            .get_document(&best.document_id)
            .map(|d| d.name)
            .unwrap_or_else(|_| "Unknown Policy".to_string());

        Ok(PolicyMatch {
            document_name,
            snippet: best.content.clone(),
            confidence: best.confidence(),
        })
    }
}
