//! auditcore: compliance evidence pipeline
//!
//! Turns an organization's policy documents into a searchable vector corpus,
//! maps framework controls onto that corpus, validates uploaded evidence
//! with a vision model, and keeps control statuses in sync with verdicts.
//! Recurring assessments are stamped out from imported standards catalogs.

pub mod ai;
pub mod chunker;
pub mod config;
pub mod copilot;
pub mod db;
pub mod error;
pub mod evidence;
pub mod extract;
pub mod ingest;
pub mod integrations;
pub mod mapping;
pub mod retrieve;
pub mod schedule;

pub use error::{AppError, ErrorCategory, ErrorCode};
