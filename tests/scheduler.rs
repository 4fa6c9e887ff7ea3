//! Scheduled assessment runs against a real SQLite store

mod common;

use common::TestContext;

use auditcore::db::{
    now_rfc3339, AssessmentStatus, ControlStatus, Frequency, MasterControl, Schedule, Standard,
};
use auditcore::schedule::ScheduleEngine;

fn seed_standard(ctx: &TestContext, standard_id: &str, masters: usize) {
    ctx.db
        .insert_standard(&Standard {
            id: standard_id.to_string(),
            name: "NIST 800-171".to_string(),
            description: "Imported from nist-800-171.xlsx".to_string(),
            total_controls: masters as i64,
            created_at: now_rfc3339(),
        })
        .unwrap();

    let rows: Vec<MasterControl> = (0..masters)
        .map(|i| MasterControl {
            id: format!("master-{}", i),
            standard_id: standard_id.to_string(),
            control_code: format!("3.1.{}", i + 1),
            family: "Access Control".to_string(),
            description: format!("Requirement {}", i + 1),
            guidance: "See the assessment guide.".to_string(),
            embedding: vec![0.1, 0.2],
        })
        .collect();
    ctx.db.insert_master_controls(&rows).unwrap();
}

fn seed_schedule(ctx: &TestContext, id: &str, standard_id: &str, frequency: Frequency) {
    ctx.db
        .insert_schedule(&Schedule {
            id: id.to_string(),
            name: "Quarterly NIST Review".to_string(),
            standard_id: standard_id.to_string(),
            system_id: Some("system-7".to_string()),
            frequency,
            last_run: None,
            next_run: None,
            status: "Active".to_string(),
        })
        .unwrap();
}

#[test]
fn run_clones_masters_into_fresh_assessment() {
    let ctx = TestContext::new();
    seed_standard(&ctx, "std-1", 4);
    seed_schedule(&ctx, "sch-1", "std-1", Frequency::Quarterly);

    let summary = ScheduleEngine::new(&ctx.db).run("sch-1").unwrap();
    assert_eq!(summary.controls_cloned, 4);

    let assessment = ctx.db.get_assessment(&summary.assessment_id).unwrap();
    assert!(assessment.title.starts_with("AUTO: Quarterly NIST Review - "));
    assert_eq!(assessment.standard_name, "NIST 800-171");
    assert_eq!(assessment.status, AssessmentStatus::InProgress);
    assert_eq!(assessment.progress, 0);
    assert_eq!(assessment.system_id.as_deref(), Some("system-7"));

    let controls = ctx.db.controls_for_assessment(&summary.assessment_id).unwrap();
    assert_eq!(controls.len(), 4);
    assert!(controls
        .iter()
        .all(|c| c.status == ControlStatus::NotStarted));
    // Clones carry the catalog fields, not references to it.
    assert!(controls.iter().any(|c| c.control_code == "3.1.1"));
}

#[test]
fn run_advances_schedule_markers_by_frequency() {
    let ctx = TestContext::new();
    seed_standard(&ctx, "std-1", 1);
    seed_schedule(&ctx, "sch-1", "std-1", Frequency::Quarterly);

    let summary = ScheduleEngine::new(&ctx.db).run("sch-1").unwrap();

    let schedule = ctx.db.get_schedule("sch-1").unwrap();
    let last_run_raw = schedule.last_run.unwrap();
    let next_run_raw = schedule.next_run.unwrap();
    assert_eq!(next_run_raw, summary.next_run);

    let last_run = chrono::DateTime::parse_from_rfc3339(&last_run_raw).unwrap();
    let next_run = chrono::DateTime::parse_from_rfc3339(&next_run_raw).unwrap();
    assert_eq!((next_run - last_run).num_days(), 90);
}

#[test]
fn standard_with_no_masters_yields_empty_assessment() {
    let ctx = TestContext::new();
    seed_standard(&ctx, "std-empty", 0);
    seed_schedule(&ctx, "sch-1", "std-empty", Frequency::Weekly);

    // Zero master controls is a warning, not an error.
    let summary = ScheduleEngine::new(&ctx.db).run("sch-1").unwrap();
    assert_eq!(summary.controls_cloned, 0);
    assert!(ctx
        .db
        .controls_for_assessment(&summary.assessment_id)
        .unwrap()
        .is_empty());

    // Run markers still advance.
    assert!(ctx.db.get_schedule("sch-1").unwrap().last_run.is_some());
}

#[test]
fn missing_schedule_is_an_error() {
    let ctx = TestContext::new();
    let err = ScheduleEngine::new(&ctx.db).run("no-such-schedule").unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn repeated_runs_accumulate_history() {
    let ctx = TestContext::new();
    seed_standard(&ctx, "std-1", 2);
    seed_schedule(&ctx, "sch-1", "std-1", Frequency::Monthly);

    let engine = ScheduleEngine::new(&ctx.db);
    let first = engine.run("sch-1").unwrap();
    let second = engine.run("sch-1").unwrap();
    assert_ne!(first.assessment_id, second.assessment_id);

    let count: i64 = ctx
        .db
        .conn()
        .query_row("SELECT COUNT(*) FROM assessments", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
}
