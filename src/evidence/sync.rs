//! Evidence-to-control status synchronization
//!
//! The evidence write is the source of truth; the control status mirrors the
//! latest verdict. When the mirror update fails the verdict is already
//! persisted, so the failure is logged as a partial sync and the caller is
//! not failed.

use tracing::warn;

use crate::db::{ControlStatus, Database, EvidenceStatus};
use crate::error::ErrorCode;

/// Control status implied by an evidence verdict
pub fn control_status_for(evidence_status: EvidenceStatus) -> ControlStatus {
    match evidence_status {
        EvidenceStatus::Verified => ControlStatus::Compliant,
        EvidenceStatus::Failed => ControlStatus::Failed,
        EvidenceStatus::Pending | EvidenceStatus::Missing => ControlStatus::ReviewRequired,
    }
}

/// Mirror an evidence verdict onto the owning control. Last write wins when
/// multiple evidence rows race. Safe to call again with the same status.
pub fn sync_control_status(db: &Database, control_id: &str, evidence_status: EvidenceStatus) {
    let target = control_status_for(evidence_status);
    if let Err(e) = db.update_control_status(control_id, target) {
        warn!(
            code = ErrorCode::PARTIAL_SYNC,
            control = control_id,
            target = %target,
            error = %e,
            "evidence verdict stored but control status was not updated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{now_rfc3339, Assessment, AssessmentStatus, Control};
    use tempfile::tempdir;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            control_status_for(EvidenceStatus::Verified),
            ControlStatus::Compliant
        );
        assert_eq!(
            control_status_for(EvidenceStatus::Failed),
            ControlStatus::Failed
        );
        assert_eq!(
            control_status_for(EvidenceStatus::Pending),
            ControlStatus::ReviewRequired
        );
        assert_eq!(
            control_status_for(EvidenceStatus::Missing),
            ControlStatus::ReviewRequired
        );
    }

    #[test]
    fn test_sync_updates_control() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("t.db")).unwrap();
        db.initialize().unwrap();

        db.insert_assessment(&Assessment {
            id: "a1".to_string(),
            title: "Audit".to_string(),
            system_id: None,
            standard_name: "CMMC".to_string(),
            status: AssessmentStatus::InProgress,
            progress: 0,
            created_at: now_rfc3339(),
        })
        .unwrap();
        db.insert_controls(&[Control {
            id: "c1".to_string(),
            assessment_id: "a1".to_string(),
            control_code: "AC-1".to_string(),
            family: "Access Control".to_string(),
            description: "Limit access".to_string(),
            status: ControlStatus::NotStarted,
        }])
        .unwrap();

        sync_control_status(&db, "c1", EvidenceStatus::Verified);
        assert_eq!(
            db.get_control("c1").unwrap().status,
            ControlStatus::Compliant
        );

        // Re-applying the same verdict is a no-op, not an error.
        sync_control_status(&db, "c1", EvidenceStatus::Verified);
        assert_eq!(
            db.get_control("c1").unwrap().status,
            ControlStatus::Compliant
        );
    }

    #[test]
    fn test_sync_on_missing_control_does_not_panic() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("t.db")).unwrap();
        db.initialize().unwrap();

        sync_control_status(&db, "ghost", EvidenceStatus::Failed);
    }
}
