//! Multimodal evidence validation
//!
//! Fetches the uploaded artifact, forks on content type, and asks the vision
//! model for a structured verdict. Only raster images reach the model; other
//! types come back as a Pending verdict asking for manual review, with
//! nothing written to the database.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::ai::{CompletionClient, CompletionRequest, ContentBlock, Message};
use crate::db::{Database, EvidenceStatus};
use crate::error::{AppError, ErrorCategory, ErrorCode};
use crate::evidence::sync::sync_control_status;

const RASTER_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
const VERDICT_MAX_TOKENS: u32 = 1024;

const AUDITOR_SYSTEM_PROMPT: &str = r#"You are an expert Security Auditor.
Your task: Evaluate if the provided screenshot PROVES compliance with the Control Requirement.

Return ONLY JSON in this format:
{
  "status": "Verified" | "Rejected" | "Inconclusive",
  "confidence_score": <number 0-100>,
  "reasoning": "Concise explanation of why the score was given."
}

Scoring Guide:
- 90-100: The image clearly shows the exact setting/config required.
- 50-89: The image is related but might be missing specific details.
- 0-49: The image is unrelated, blurry, or contradicts the requirement."#;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Artifact request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Artifact fetch returned status {0}")]
    Status(u16),
}

/// A downloaded evidence artifact
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Evidence artifact download seam
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedArtifact, FetchError>;
}

pub struct HttpArtifactFetcher {
    client: reqwest::Client,
}

impl HttpArtifactFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedArtifact, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let bytes = response.bytes().await?.to_vec();
        Ok(FetchedArtifact {
            content_type,
            bytes,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    Verified,
    Rejected,
    /// Raster artifact the model could not judge, or an unrecognized status
    /// string in the reply
    Inconclusive,
}

impl<'de> serde::Deserialize<'de> for VerdictStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "Verified" => Self::Verified,
            "Rejected" => Self::Rejected,
            _ => Self::Inconclusive,
        })
    }
}

/// Structured judgment on one evidence artifact
#[derive(Debug, Clone, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub confidence_score: i64,
    pub reasoning: String,
}

/// Caller-facing outcome: either a persisted model verdict or a skip
#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    /// Model judged the image; evidence and control rows were updated
    Judged(Verdict),
    /// Non-raster artifact, nothing was written
    ManualReviewRequired { reasoning: String },
}

/// Parse the model's verdict JSON. The assistant turn is primed with `{`,
/// so the reply usually arrives without its opening brace; one repair pass
/// prepends it before giving up on a synthetic Inconclusive verdict.
fn parse_verdict(raw: &str) -> Verdict {
    let cleaned = raw.trim();
    let json = if cleaned.starts_with('{') {
        cleaned.to_string()
    } else {
        format!("{{ {}", cleaned)
    };

    serde_json::from_str(&json).unwrap_or_else(|e| {
        warn!(error = %e, raw = cleaned, "verdict parse failed");
        Verdict {
            status: VerdictStatus::Inconclusive,
            confidence_score: 0,
            reasoning: "AI output format error.".to_string(),
        }
    })
}

fn is_raster(content_type: &str) -> bool {
    RASTER_TYPES.contains(&content_type)
}

pub struct EvidenceValidator<'a> {
    db: &'a Database,
    model: &'a dyn CompletionClient,
    fetcher: &'a dyn ArtifactFetcher,
}

impl<'a> EvidenceValidator<'a> {
    pub fn new(
        db: &'a Database,
        model: &'a dyn CompletionClient,
        fetcher: &'a dyn ArtifactFetcher,
    ) -> Self {
        Self { db, model, fetcher }
    }

    /// Validate an evidence row against its control's requirement text
    pub async fn validate(&self, evidence_id: &str) -> Result<ValidationOutcome, AppError> {
        let evidence = self.db.get_evidence(evidence_id)?;
        let control = self.db.get_control(&evidence.control_id)?;

        let url = evidence.url.as_deref().ok_or_else(|| {
            AppError::new(
                ErrorCode::VALIDATION_INVALID_URL,
                "Evidence has no artifact URL to validate",
                ErrorCategory::Validation,
            )
        })?;

        let artifact = self.fetcher.fetch(url).await.map_err(|e| {
            AppError::new(
                ErrorCode::NETWORK_CONNECTION_FAILED,
                "Failed to fetch evidence artifact",
                ErrorCategory::Network,
            )
            .with_detail(e.to_string())
            .retryable()
        })?;

        if !is_raster(&artifact.content_type) {
            info!(
                evidence = evidence_id,
                content_type = %artifact.content_type,
                "artifact is not a supported image, skipping vision analysis"
            );
            return Ok(ValidationOutcome::ManualReviewRequired {
                reasoning: format!(
                    "File type ({}) cannot be visually analyzed by AI. Manual review required.",
                    artifact.content_type
                ),
            });
        }

        let payload = BASE64.encode(&artifact.bytes);
        let raw = self
            .model
            .complete(CompletionRequest {
                system: Some(AUDITOR_SYSTEM_PROMPT.to_string()),
                messages: vec![
                    Message::user(vec![
                        ContentBlock::image(artifact.content_type.clone(), payload),
                        ContentBlock::text(format!(
                            "Control Requirement: \"{}\".\n\nAnalyze this evidence.",
                            control.description
                        )),
                    ]),
                    Message::assistant("{"),
                ],
                max_tokens: VERDICT_MAX_TOKENS,
            })
            .await?;

        let verdict = parse_verdict(&raw);

        // Anything short of Verified fails the evidence; Inconclusive is not
        // a pass.
        let evidence_status = match verdict.status {
            VerdictStatus::Verified => EvidenceStatus::Verified,
            _ => EvidenceStatus::Failed,
        };

        info!(
            evidence = evidence_id,
            status = %evidence_status,
            confidence = verdict.confidence_score,
            "verdict persisted"
        );

        let control_id = self.db.update_evidence_verdict(
            evidence_id,
            evidence_status,
            &verdict.reasoning,
            verdict.confidence_score,
        )?;

        sync_control_status(self.db, &control_id, evidence_status);

        Ok(ValidationOutcome::Judged(verdict))
    }
}
