//! Evidence validation and control status sync

pub mod sync;
pub mod validator;

pub use sync::{control_status_for, sync_control_status};
pub use validator::{
    ArtifactFetcher, EvidenceValidator, FetchError, FetchedArtifact, HttpArtifactFetcher,
    ValidationOutcome, Verdict, VerdictStatus,
};
