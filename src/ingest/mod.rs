//! Ingestion pipelines: policy documents and standards spreadsheets

pub mod documents;
pub mod standards;

pub use documents::{DocumentIngestor, IngestSummary};
pub use standards::{ImportSummary, StandardImporter};
