//! Environment-backed service configuration
//!
//! All external-service credentials and endpoints come from the environment
//! (optionally via a `.env` file). Missing required values fail immediately
//! with a configuration error; nothing here is retried.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

/// Configuration for all external service clients.
///
/// Owned by the process entry point and handed to pipeline components as
/// constructor arguments; components never read the environment themselves.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the embedding service (OpenAI-compatible `/embeddings`)
    pub embedding_base_url: String,
    pub embedding_api_key: String,
    pub embedding_model: String,
    /// Base URL of the multimodal model service (Anthropic-compatible `/messages`)
    pub model_base_url: String,
    pub model_api_key: String,
    pub model_id: String,
    /// SQLite database path
    pub db_path: PathBuf,
    /// Timeout applied to every external-service call, in seconds
    pub request_timeout_secs: u64,
}

impl ServiceConfig {
    /// Load configuration from the environment, reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Ignore a missing .env file; real env vars still apply.
        let _ = dotenvy::dotenv();

        Ok(Self {
            embedding_base_url: optional_var("EMBEDDING_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            embedding_api_key: required_var("EMBEDDING_API_KEY")?,
            embedding_model: optional_var("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            model_base_url: optional_var("MODEL_BASE_URL")
                .unwrap_or_else(|| "https://api.anthropic.com/v1".to_string()),
            model_api_key: required_var("MODEL_API_KEY")?,
            model_id: optional_var("MODEL_ID")
                .unwrap_or_else(|| "claude-sonnet-4-20250514".to_string()),
            db_path: optional_var("AUDITCORE_DB")
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path),
            request_timeout_secs: match optional_var("REQUEST_TIMEOUT_SECS") {
                Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                    var: "REQUEST_TIMEOUT_SECS".into(),
                    reason: format!("not a number: {}", v),
                })?,
                None => 30,
            },
        })
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Default database location under the platform data directory
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("auditcore")
        .join("auditcore.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_db_path_has_filename() {
        let path = default_db_path();
        assert_eq!(path.file_name().unwrap(), "auditcore.db");
    }

    #[test]
    fn test_missing_var_message_names_variable() {
        let err = required_var("AUDITCORE_TEST_DOES_NOT_EXIST").unwrap_err();
        assert!(err.to_string().contains("AUDITCORE_TEST_DOES_NOT_EXIST"));
    }
}
