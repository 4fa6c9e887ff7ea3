//! Shared test fixtures: temp database plus in-process AI fakes

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

use auditcore::ai::{
    CompletionClient, CompletionRequest, EmbeddingClient, EmbeddingError, ModelError,
};
use auditcore::db::{
    now_rfc3339, Assessment, AssessmentStatus, Control, ControlStatus, Database, Evidence,
    EvidenceSource, EvidenceStatus,
};
use auditcore::evidence::{ArtifactFetcher, FetchError, FetchedArtifact};

pub struct TestContext {
    pub db: Database,
    _dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let db = Database::open(&dir.path().join("test.db")).expect("open db");
        db.initialize().expect("initialize schema");
        Self { db, _dir: dir }
    }

    /// Seed one assessment with one control, returning the control id
    pub fn seed_control(&self, status: ControlStatus) -> String {
        self.db
            .insert_assessment(&Assessment {
                id: "assessment-1".to_string(),
                title: "Q3 Audit".to_string(),
                system_id: None,
                standard_name: "CMMC Level 1".to_string(),
                status: AssessmentStatus::InProgress,
                progress: 0,
                created_at: now_rfc3339(),
            })
            .expect("insert assessment");

        self.db
            .insert_controls(&[Control {
                id: "control-1".to_string(),
                assessment_id: "assessment-1".to_string(),
                control_code: "AC.1.001".to_string(),
                family: "Access Control".to_string(),
                description: "Limit information system access to authorized users".to_string(),
                status,
            }])
            .expect("insert control");

        "control-1".to_string()
    }

    /// Seed a Pending evidence row on a control, returning the evidence id
    pub fn seed_evidence(&self, control_id: &str, url: Option<&str>) -> String {
        let id = "evidence-1".to_string();
        self.db
            .insert_evidence(&Evidence {
                id: id.clone(),
                control_id: control_id.to_string(),
                name: "screenshot.png".to_string(),
                source_type: EvidenceSource::Manual,
                status: EvidenceStatus::Pending,
                url: url.map(|u| u.to_string()),
                snippet: None,
                ai_feedback: None,
                confidence_score: None,
                created_at: now_rfc3339(),
            })
            .expect("insert evidence");
        id
    }
}

/// Embedder that returns a fixed vector for every input
pub struct FixedEmbedder {
    pub vector: Vec<f32>,
}

impl FixedEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

#[async_trait]
impl EmbeddingClient for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector.clone())
    }
}

/// Embedder that maps exact input strings to canned vectors; unknown inputs
/// get an orthogonal default so they match nothing.
pub struct CannedEmbedder {
    pub canned: Vec<(String, Vec<f32>)>,
    pub default: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for CannedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self
            .canned
            .iter()
            .find(|(k, _)| text.contains(k.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.default.clone()))
    }
}

/// Embedder that always fails, for abort-path tests
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingClient for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Api {
            status: 503,
            body: "service unavailable".to_string(),
        })
    }
}

/// Completion client that returns a canned reply and counts calls
pub struct StubModel {
    pub reply: String,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<CompletionRequest>>,
}

impl StubModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for StubModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        Ok(self.reply.clone())
    }
}

/// Fetcher that serves one fixed artifact for any URL
pub struct StubFetcher {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl StubFetcher {
    pub fn new(content_type: &str, bytes: &[u8]) -> Self {
        Self {
            content_type: content_type.to_string(),
            bytes: bytes.to_vec(),
        }
    }
}

#[async_trait]
impl ArtifactFetcher for StubFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedArtifact, FetchError> {
        Ok(FetchedArtifact {
            content_type: self.content_type.clone(),
            bytes: self.bytes.clone(),
        })
    }
}
