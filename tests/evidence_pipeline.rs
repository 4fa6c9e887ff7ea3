//! Evidence validation flows: content-type fork, verdict persistence, and
//! control status sync

mod common;

use common::{StubFetcher, StubModel, TestContext};

use auditcore::ai::ContentBlock;
use auditcore::db::{ControlStatus, EvidenceStatus};
use auditcore::evidence::validator::{EvidenceValidator, ValidationOutcome};
use auditcore::evidence::VerdictStatus;

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[tokio::test]
async fn non_image_artifact_skips_model_and_writes_nothing() {
    let ctx = TestContext::new();
    let control_id = ctx.seed_control(ControlStatus::NotStarted);
    let evidence_id = ctx.seed_evidence(&control_id, Some("https://files.test/report.pdf"));

    let model = StubModel::new("should never be called");
    let fetcher = StubFetcher::new("application/pdf", b"%PDF-1.7");

    let outcome = EvidenceValidator::new(&ctx.db, &model, &fetcher)
        .validate(&evidence_id)
        .await
        .unwrap();

    let reasoning = match outcome {
        ValidationOutcome::ManualReviewRequired { reasoning } => reasoning,
        ValidationOutcome::Judged(_) => panic!("expected manual-review outcome"),
    };
    assert_eq!(
        reasoning,
        "File type (application/pdf) cannot be visually analyzed by AI. Manual review required."
    );
    assert_eq!(model.call_count(), 0);

    // Nothing was written: evidence still Pending, control untouched.
    let evidence = ctx.db.get_evidence(&evidence_id).unwrap();
    assert_eq!(evidence.status, EvidenceStatus::Pending);
    assert!(evidence.ai_feedback.is_none());
    assert_eq!(
        ctx.db.get_control(&control_id).unwrap().status,
        ControlStatus::NotStarted
    );
}

#[tokio::test]
async fn verified_verdict_marks_evidence_and_control() {
    let ctx = TestContext::new();
    let control_id = ctx.seed_control(ControlStatus::NotStarted);
    let evidence_id = ctx.seed_evidence(&control_id, Some("https://files.test/mfa.png"));

    // Primed replies arrive without the opening brace.
    let model = StubModel::new(
        r#""status": "Verified", "confidence_score": 95, "reasoning": "Screenshot shows MFA enforcement enabled."}"#,
    );
    let fetcher = StubFetcher::new("image/png", PNG_BYTES);

    let outcome = EvidenceValidator::new(&ctx.db, &model, &fetcher)
        .validate(&evidence_id)
        .await
        .unwrap();

    let verdict = match outcome {
        ValidationOutcome::Judged(v) => v,
        _ => panic!("expected a judged outcome"),
    };
    assert_eq!(verdict.status, VerdictStatus::Verified);

    let evidence = ctx.db.get_evidence(&evidence_id).unwrap();
    assert_eq!(evidence.status, EvidenceStatus::Verified);
    assert_eq!(evidence.confidence_score, Some(95));
    assert_eq!(
        evidence.ai_feedback.as_deref(),
        Some("Screenshot shows MFA enforcement enabled.")
    );

    assert_eq!(
        ctx.db.get_control(&control_id).unwrap().status,
        ControlStatus::Compliant
    );
}

#[tokio::test]
async fn rejected_verdict_fails_evidence_and_control() {
    let ctx = TestContext::new();
    let control_id = ctx.seed_control(ControlStatus::NotStarted);
    let evidence_id = ctx.seed_evidence(&control_id, Some("https://files.test/desk.jpg"));

    let model = StubModel::new(
        r#"{"status": "Rejected", "confidence_score": 15, "reasoning": "Image is unrelated to the control."}"#,
    );
    let fetcher = StubFetcher::new("image/jpeg", &[0xff, 0xd8, 0xff]);

    EvidenceValidator::new(&ctx.db, &model, &fetcher)
        .validate(&evidence_id)
        .await
        .unwrap();

    assert_eq!(
        ctx.db.get_evidence(&evidence_id).unwrap().status,
        EvidenceStatus::Failed
    );
    assert_eq!(
        ctx.db.get_control(&control_id).unwrap().status,
        ControlStatus::Failed
    );
}

#[tokio::test]
async fn unparseable_reply_falls_back_to_synthetic_verdict() {
    let ctx = TestContext::new();
    let control_id = ctx.seed_control(ControlStatus::NotStarted);
    let evidence_id = ctx.seed_evidence(&control_id, Some("https://files.test/blur.png"));

    let model = StubModel::new("I cannot determine compliance from this image.");
    let fetcher = StubFetcher::new("image/png", PNG_BYTES);

    EvidenceValidator::new(&ctx.db, &model, &fetcher)
        .validate(&evidence_id)
        .await
        .unwrap();

    let evidence = ctx.db.get_evidence(&evidence_id).unwrap();
    assert_eq!(evidence.status, EvidenceStatus::Failed);
    assert_eq!(evidence.confidence_score, Some(0));
    assert_eq!(evidence.ai_feedback.as_deref(), Some("AI output format error."));
    assert_eq!(
        ctx.db.get_control(&control_id).unwrap().status,
        ControlStatus::Failed
    );
}

#[tokio::test]
async fn request_carries_image_requirement_and_primer() {
    let ctx = TestContext::new();
    let control_id = ctx.seed_control(ControlStatus::NotStarted);
    let evidence_id = ctx.seed_evidence(&control_id, Some("https://files.test/mfa.png"));

    let model = StubModel::new(
        r#""status": "Verified", "confidence_score": 90, "reasoning": "ok"}"#,
    );
    let fetcher = StubFetcher::new("image/png", PNG_BYTES);

    EvidenceValidator::new(&ctx.db, &model, &fetcher)
        .validate(&evidence_id)
        .await
        .unwrap();

    let request = model.last_request.lock().unwrap().take().unwrap();
    assert!(request.system.unwrap().contains("Security Auditor"));
    assert_eq!(request.messages.len(), 2);

    // First user block is the image, second is the requirement text.
    let user = &request.messages[0];
    assert!(matches!(user.content[0], ContentBlock::Image { .. }));
    match &user.content[1] {
        ContentBlock::Text { text } => {
            assert!(text.contains("Limit information system access"));
        }
        _ => panic!("expected requirement text block"),
    }

    // Final assistant turn primes the JSON object.
    match &request.messages[1].content[0] {
        ContentBlock::Text { text } => assert_eq!(text, "{"),
        _ => panic!("expected assistant primer"),
    }
}

#[tokio::test]
async fn evidence_without_url_is_a_validation_error() {
    let ctx = TestContext::new();
    let control_id = ctx.seed_control(ControlStatus::NotStarted);
    let evidence_id = ctx.seed_evidence(&control_id, None);

    let model = StubModel::new("unused");
    let fetcher = StubFetcher::new("image/png", PNG_BYTES);

    let err = EvidenceValidator::new(&ctx.db, &model, &fetcher)
        .validate(&evidence_id)
        .await
        .unwrap_err();
    assert_eq!(err.code, "VALIDATION_INVALID_URL");
    assert_eq!(model.call_count(), 0);
}
