//! Application error types for auditcore
//!
//! Provides a unified error model across all pipeline operations with:
//! - Stable error codes for API consumers
//! - User-friendly messages
//! - Optional internal details for logging
//! - Retry hints for callers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error categories for grouping and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Missing or invalid credentials/configuration
    Configuration,
    /// Source artifact unreadable or empty
    Extraction,
    /// Upstream AI service call failed (embedding or model)
    Service,
    /// Model output not schema-conformant
    Parse,
    /// Network errors (connection, timeout)
    Network,
    /// Resource not found
    NotFound,
    /// Database errors
    Database,
    /// Input validation errors
    Validation,
    /// Internal errors (unexpected state, bugs)
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Extraction => write!(f, "extraction"),
            Self::Service => write!(f, "service"),
            Self::Parse => write!(f, "parse"),
            Self::Network => write!(f, "network"),
            Self::NotFound => write!(f, "not_found"),
            Self::Database => write!(f, "database"),
            Self::Validation => write!(f, "validation"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Stable error codes for API consumers
/// Format: CATEGORY_SPECIFIC_ERROR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode(pub String);

impl ErrorCode {
    // Configuration errors
    pub const CONFIG_MISSING_VAR: &'static str = "CONFIG_MISSING_VAR";
    pub const CONFIG_INVALID_VALUE: &'static str = "CONFIG_INVALID_VALUE";

    // Extraction errors
    pub const EXTRACT_EMPTY: &'static str = "EXTRACT_EMPTY";
    pub const EXTRACT_UNREADABLE: &'static str = "EXTRACT_UNREADABLE";
    pub const EXTRACT_UNSUPPORTED_TYPE: &'static str = "EXTRACT_UNSUPPORTED_TYPE";

    // Upstream service errors
    pub const EMBEDDING_SERVICE: &'static str = "EMBEDDING_SERVICE";
    pub const MODEL_SERVICE: &'static str = "MODEL_SERVICE";
    pub const MODEL_PARSE: &'static str = "MODEL_PARSE";

    // Network errors
    pub const NETWORK_CONNECTION_FAILED: &'static str = "NETWORK_CONNECTION_FAILED";
    pub const NETWORK_TIMEOUT: &'static str = "NETWORK_TIMEOUT";
    pub const NETWORK_AUTH_FAILED: &'static str = "NETWORK_AUTH_FAILED";
    pub const NETWORK_RATE_LIMITED: &'static str = "NETWORK_RATE_LIMITED";

    // Not found errors
    pub const NOT_FOUND_DOCUMENT: &'static str = "NOT_FOUND_DOCUMENT";
    pub const NOT_FOUND_SCHEDULE: &'static str = "NOT_FOUND_SCHEDULE";
    pub const NOT_FOUND_STANDARD: &'static str = "NOT_FOUND_STANDARD";
    pub const NOT_FOUND_CONTROL: &'static str = "NOT_FOUND_CONTROL";
    pub const NOT_FOUND_EVIDENCE: &'static str = "NOT_FOUND_EVIDENCE";
    pub const NOT_FOUND_INTEGRATION: &'static str = "NOT_FOUND_INTEGRATION";

    // Database errors
    pub const DB_QUERY_FAILED: &'static str = "DB_QUERY_FAILED";
    pub const DB_MIGRATION_FAILED: &'static str = "DB_MIGRATION_FAILED";
    pub const DB_INVALID_ROW: &'static str = "DB_INVALID_ROW";

    // Partial sync: evidence write landed, control update did not.
    // Logged as a warning, never surfaced as a hard failure.
    pub const PARTIAL_SYNC: &'static str = "PARTIAL_SYNC";

    // Validation errors
    pub const VALIDATION_EMPTY_INPUT: &'static str = "VALIDATION_EMPTY_INPUT";
    pub const VALIDATION_INVALID_URL: &'static str = "VALIDATION_INVALID_URL";

    // Internal errors
    pub const INTERNAL_ERROR: &'static str = "INTERNAL_ERROR";

    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Application error type for all pipeline operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppError {
    /// Stable error code
    pub code: String,
    /// User-friendly error message
    pub message: String,
    /// Optional internal details for logging (not shown to users)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Whether the operation can be retried
    pub retryable: bool,
    /// Error category for grouping
    pub category: ErrorCategory,
}

impl AppError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        category: ErrorCategory,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: None,
            retryable: false,
            category,
        }
    }

    /// Add internal detail for logging
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Mark as retryable
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    // =========================================================================
    // Convenience constructors for common errors
    // =========================================================================

    pub fn missing_config(var: &str) -> Self {
        Self::new(
            ErrorCode::CONFIG_MISSING_VAR,
            format!("Missing required configuration: {}", var),
            ErrorCategory::Configuration,
        )
    }

    pub fn extraction_empty(name: &str) -> Self {
        Self::new(
            ErrorCode::EXTRACT_EMPTY,
            format!("Extracted text from '{}' is empty or too short to index", name),
            ErrorCategory::Extraction,
        )
    }

    pub fn embedding_service(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::EMBEDDING_SERVICE,
            "Embedding service call failed",
            ErrorCategory::Service,
        )
        .with_detail(detail)
        .retryable()
    }

    pub fn model_service(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::MODEL_SERVICE,
            "Model service call failed",
            ErrorCategory::Service,
        )
        .with_detail(detail)
        .retryable()
    }

    pub fn schedule_not_found(id: &str) -> Self {
        Self::new(
            ErrorCode::NOT_FOUND_SCHEDULE,
            format!("Schedule not found: {}", id),
            ErrorCategory::NotFound,
        )
    }

    pub fn document_not_found(id: &str) -> Self {
        Self::new(
            ErrorCode::NOT_FOUND_DOCUMENT,
            format!("Document not found: {}", id),
            ErrorCategory::NotFound,
        )
    }

    pub fn db_query_failed(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DB_QUERY_FAILED,
            "Database operation failed",
            ErrorCategory::Database,
        )
        .with_detail(detail)
    }

    pub fn empty_input(field: &str) -> Self {
        Self::new(
            ErrorCode::VALIDATION_EMPTY_INPUT,
            format!("{} cannot be empty", field),
            ErrorCategory::Validation,
        )
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::INTERNAL_ERROR,
            "An internal error occurred",
            ErrorCategory::Internal,
        )
        .with_detail(detail)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        Self::db_query_failed(e.to_string())
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(e: crate::db::DbError) -> Self {
        match e {
            crate::db::DbError::NotFound { entity, id } => Self::new(
                format!("NOT_FOUND_{}", entity.to_uppercase()),
                format!("{} not found: {}", entity, id),
                ErrorCategory::NotFound,
            ),
            other => Self::db_query_failed(other.to_string()),
        }
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(e: crate::config::ConfigError) -> Self {
        match &e {
            crate::config::ConfigError::MissingVar(var) => Self::missing_config(var),
            crate::config::ConfigError::InvalidValue { var, reason } => Self::new(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!("Invalid configuration for {}: {}", var, reason),
                ErrorCategory::Configuration,
            ),
        }
    }
}

impl From<crate::ai::embeddings::EmbeddingError> for AppError {
    fn from(e: crate::ai::embeddings::EmbeddingError) -> Self {
        Self::embedding_service(e.to_string())
    }
}

impl From<crate::ai::model::ModelError> for AppError {
    fn from(e: crate::ai::model::ModelError) -> Self {
        Self::model_service(e.to_string())
    }
}

impl From<crate::extract::ExtractError> for AppError {
    fn from(e: crate::extract::ExtractError) -> Self {
        match &e {
            crate::extract::ExtractError::Empty(name) => Self::extraction_empty(name),
            crate::extract::ExtractError::UnsupportedType(ext) => Self::new(
                ErrorCode::EXTRACT_UNSUPPORTED_TYPE,
                format!("Unsupported document type: {}", ext),
                ErrorCategory::Extraction,
            ),
            other => Self::new(
                ErrorCode::EXTRACT_UNREADABLE,
                "Could not extract text from document",
                ErrorCategory::Extraction,
            )
            .with_detail(other.to_string()),
        }
    }
}
