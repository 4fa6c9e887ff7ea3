//! End-to-end ingestion and mapping flows against a real SQLite store

mod common;

use common::{CannedEmbedder, FailingEmbedder, FixedEmbedder, TestContext};

use auditcore::db::{ChunkRecord, ControlStatus, DocumentStatus, EvidenceStatus};
use auditcore::ingest::DocumentIngestor;
use auditcore::mapping::{MapOutcome, PolicyMapper};

/// 80 sentences of exactly 30 chars = 2,400 chars of policy text
fn sample_policy_text() -> String {
    (0..80)
        .map(|i| format!("Sent {:03} pad to thirty chars. ", i))
        .collect::<String>()
        .trim_end()
        .to_string()
}

fn write_temp(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn ingests_document_into_three_ready_chunks() {
    let ctx = TestContext::new();
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp(&dir, "policy.txt", &sample_policy_text());

    let embedder = FixedEmbedder::new(vec![0.5, 0.5]);
    let summary = DocumentIngestor::new(&ctx.db, &embedder)
        .ingest_file(&path)
        .await
        .unwrap();

    assert_eq!(summary.chunk_count, 3);

    let doc = ctx.db.get_document(&summary.document_id).unwrap();
    assert_eq!(doc.status, DocumentStatus::Ready);
    assert_eq!(doc.chunk_count, 3);
    assert_eq!(doc.name, "policy.txt");

    let chunks = ctx.db.all_chunks_with_embeddings().unwrap();
    assert_eq!(chunks.len(), 3);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i as i64);
        assert!(!chunk.content.is_empty());
        assert_eq!(chunk.embedding, vec![0.5, 0.5]);
    }
}

#[tokio::test]
async fn unreadable_document_is_marked_failed() {
    let ctx = TestContext::new();
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp(&dir, "stub.txt", "too short to index");

    let embedder = FixedEmbedder::new(vec![1.0]);
    let result = DocumentIngestor::new(&ctx.db, &embedder)
        .ingest_file(&path)
        .await;
    assert!(result.is_err());

    // The document row stays visible with a terminal Failed status.
    let status: String = ctx
        .db
        .conn()
        .query_row("SELECT status FROM documents", [], |row| row.get(0))
        .unwrap();
    assert_eq!(status, "Failed");
    assert_eq!(ctx.db.chunk_count().unwrap(), 0);
}

#[tokio::test]
async fn embedding_failure_stores_no_chunks() {
    let ctx = TestContext::new();
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp(&dir, "policy.txt", &sample_policy_text());

    let result = DocumentIngestor::new(&ctx.db, &FailingEmbedder)
        .ingest_file(&path)
        .await;
    assert!(result.is_err());

    // All-or-nothing: a mid-pipeline failure leaves zero chunk rows.
    assert_eq!(ctx.db.chunk_count().unwrap(), 0);
    let status: String = ctx
        .db
        .conn()
        .query_row("SELECT status FROM documents", [], |row| row.get(0))
        .unwrap();
    assert_eq!(status, "Failed");
}

fn seed_chunk(ctx: &TestContext, id: &str, content: &str, embedding: Vec<f32>) {
    ctx.db
        .insert_document(&auditcore::db::Document {
            id: format!("doc-{}", id),
            name: format!("{}.pdf", id),
            status: DocumentStatus::Ready,
            chunk_count: 1,
            size_bytes: 100,
            created_at: auditcore::db::now_rfc3339(),
        })
        .unwrap();
    ctx.db
        .insert_chunks(&[ChunkRecord {
            id: id.to_string(),
            document_id: format!("doc-{}", id),
            chunk_index: 0,
            content: content.to_string(),
            embedding,
        }])
        .unwrap();
}

#[tokio::test]
async fn maps_control_to_best_policy_paragraph() {
    let ctx = TestContext::new();
    let control_id = ctx.seed_control(ControlStatus::NotStarted);

    seed_chunk(
        &ctx,
        "access",
        "Access to production systems is restricted to authorized users.",
        vec![1.0, 0.0],
    );
    seed_chunk(&ctx, "backup", "Backups run nightly.", vec![0.0, 1.0]);

    // The control description embeds close to the access chunk.
    let embedder = CannedEmbedder {
        canned: vec![("authorized users".to_string(), vec![0.9, 0.1])],
        default: vec![0.0, 0.0],
    };

    let mapper = PolicyMapper::new(&ctx.db, &embedder);
    let outcome = mapper.map_control(&control_id).await.unwrap();

    let policy_match = match outcome {
        MapOutcome::Found(m) => m,
        MapOutcome::NotFound => panic!("expected a match"),
    };
    assert_eq!(policy_match.document_name, "access.pdf");
    assert!(policy_match.snippet.contains("authorized users"));
    assert!(policy_match.confidence > 25);

    let evidence = mapper.attach_evidence(&control_id, &policy_match).unwrap();
    assert_eq!(evidence.status, EvidenceStatus::Pending);
    assert_eq!(
        evidence.ai_feedback.unwrap(),
        format!(
            "AI matched this policy section with {}% similarity.",
            policy_match.confidence
        )
    );

    let stored = ctx.db.get_evidence(&evidence.id).unwrap();
    assert_eq!(stored.snippet, Some(policy_match.snippet));
}

#[tokio::test]
async fn empty_library_maps_to_not_found() {
    let ctx = TestContext::new();
    let control_id = ctx.seed_control(ControlStatus::NotStarted);

    let embedder = FixedEmbedder::new(vec![1.0, 0.0]);
    let outcome = PolicyMapper::new(&ctx.db, &embedder)
        .map_control(&control_id)
        .await
        .unwrap();

    assert!(matches!(outcome, MapOutcome::NotFound));
    // Not-found attaches nothing.
    let evidence_count: i64 = ctx
        .db
        .conn()
        .query_row("SELECT COUNT(*) FROM evidence", [], |row| row.get(0))
        .unwrap();
    assert_eq!(evidence_count, 0);
}
