//! Jira Cloud integration
//!
//! Failed controls become remediation tickets; the created ticket is tracked
//! back in the evidence table so the audit trail shows the open work item.

use base64::{engine::general_purpose, Engine as _};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use crate::db::{now_rfc3339, Database, Evidence, EvidenceSource, EvidenceStatus, IntegrationRecord};
use crate::error::AppError;

#[derive(Debug, Error)]
pub enum JiraError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Jira integration not configured")]
    NotConfigured,
    #[error("Authentication failed - check your API token")]
    AuthFailed,
    #[error("Rate limited - try again later")]
    RateLimited,
    #[error("Request timeout")]
    Timeout,
}

impl From<JiraError> for AppError {
    fn from(e: JiraError) -> Self {
        AppError::new(
            "INTEGRATION_JIRA",
            "Jira operation failed",
            crate::error::ErrorCategory::Network,
        )
        .with_detail(e.to_string())
    }
}

/// Jira request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraRequestConfig {
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Number of retries for transient errors (default: 2)
    pub max_retries: u32,
    /// Retry delay in milliseconds (default: 1000)
    pub retry_delay_ms: u64,
}

impl Default for JiraRequestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

/// A ticket created in the remote tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedIssue {
    pub key: String,
    pub url: String,
}

#[derive(Deserialize)]
struct CreateIssueResponse {
    key: String,
}

/// Jira API client with secure token handling.
/// Auth credentials are zeroed when the client is dropped.
pub struct JiraClient {
    client: Client,
    base_url: String,
    auth_header: Zeroizing<String>,
    config: JiraRequestConfig,
}

impl JiraClient {
    /// The api_token is immediately encoded and the intermediate cleared
    pub fn new(base_url: &str, email: &str, api_token: &str) -> Self {
        Self::with_config(base_url, email, api_token, JiraRequestConfig::default())
    }

    pub fn with_config(
        base_url: &str,
        email: &str,
        api_token: &str,
        config: JiraRequestConfig,
    ) -> Self {
        let mut auth = format!("{}:{}", email, api_token);
        let auth_header = Zeroizing::new(format!(
            "Basic {}",
            general_purpose::STANDARD.encode(&auth)
        ));
        auth.zeroize();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header,
            config,
        }
    }

    /// Build a client from the stored integration row
    /// (config: domain, email, project_key; secret: api token).
    /// Returns the client plus the configured project key.
    pub fn from_integration(record: &IntegrationRecord) -> Result<(Self, String), JiraError> {
        let domain = record.config["domain"]
            .as_str()
            .ok_or(JiraError::NotConfigured)?;
        let email = record.config["email"]
            .as_str()
            .ok_or(JiraError::NotConfigured)?;
        let project_key = record.config["project_key"]
            .as_str()
            .ok_or(JiraError::NotConfigured)?
            .to_string();

        let base_url = if domain.starts_with("http") {
            domain.to_string()
        } else {
            format!("https://{}", domain)
        };

        Ok((Self::new(&base_url, email, &record.secret), project_key))
    }

    /// Test the connection by fetching the current user
    pub async fn test_connection(&self) -> Result<bool, JiraError> {
        let url = format!("{}/rest/api/3/myself", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header.as_str())
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        Ok(resp.status().is_success())
    }

    /// Create a Task issue with an ADF document body
    pub async fn create_issue(
        &self,
        project_key: &str,
        summary: &str,
        description: &str,
    ) -> Result<CreatedIssue, JiraError> {
        let url = format!("{}/rest/api/3/issue", self.base_url);
        let payload = json!({
            "fields": {
                "project": { "key": project_key },
                "summary": summary,
                "description": {
                    "type": "doc",
                    "version": 1,
                    "content": [
                        {
                            "type": "paragraph",
                            "content": [{ "type": "text", "text": description }]
                        }
                    ]
                },
                "issuetype": { "name": "Task" }
            }
        });

        let response = self
            .execute_with_retry(|| async {
                self.client
                    .post(&url)
                    .header(header::AUTHORIZATION, self.auth_header.as_str())
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::ACCEPT, "application/json")
                    .json(&payload)
                    .send()
                    .await
            })
            .await?;

        let created: CreateIssueResponse = response
            .json()
            .await
            .map_err(|e| JiraError::Parse(e.to_string()))?;

        let issue_url = format!("{}/browse/{}", self.base_url, created.key);
        Ok(CreatedIssue {
            key: created.key,
            url: issue_url,
        })
    }

    async fn execute_with_retry<F, Fut>(&self, request_fn: F) -> Result<reqwest::Response, JiraError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match request_fn().await {
                Ok(response) => {
                    let status = response.status();

                    // Auth errors: fail immediately, no retry
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(JiraError::AuthFailed);
                    }

                    // Rate limited: fail immediately with specific error
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        return Err(JiraError::RateLimited);
                    }

                    if status.is_success() {
                        return Ok(response);
                    }

                    // Server errors (5xx): retry
                    if status.is_server_error() {
                        last_error = Some(JiraError::Api(format!("Server error: {}", status)));
                        if attempt < self.config.max_retries {
                            tokio::time::sleep(Duration::from_millis(
                                self.config.retry_delay_ms * (attempt as u64 + 1),
                            ))
                            .await;
                            continue;
                        }
                    }

                    // Other client errors: fail immediately
                    let body = response.text().await.unwrap_or_default();
                    return Err(JiraError::Api(format!("HTTP {}: {}", status, body)));
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error = Some(JiraError::Timeout);
                    } else if e.is_connect() || e.is_request() {
                        last_error = Some(JiraError::Request(e));
                    } else {
                        return Err(JiraError::Request(e));
                    }

                    if attempt < self.config.max_retries {
                        tokio::time::sleep(Duration::from_millis(
                            self.config.retry_delay_ms * (attempt as u64 + 1),
                        ))
                        .await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(JiraError::Api("Request failed".to_string())))
    }
}

/// Open a remediation ticket for a failed control and track it as Pending
/// Integration evidence (Pending = ticket still open).
pub async fn create_remediation_ticket(
    db: &Database,
    client: &JiraClient,
    project_key: &str,
    control_id: &str,
    title: &str,
    description: &str,
) -> Result<CreatedIssue, AppError> {
    let summary = format!("Compliance Failure: {}", title);
    let body = if description.is_empty() {
        "No description."
    } else {
        description
    };

    let issue = client.create_issue(project_key, &summary, body).await?;

    db.insert_evidence(&Evidence {
        id: Uuid::new_v4().to_string(),
        control_id: control_id.to_string(),
        name: format!("Remediation Ticket: {}", issue.key),
        source_type: EvidenceSource::Integration,
        status: EvidenceStatus::Pending,
        url: Some(issue.url.clone()),
        snippet: None,
        ai_feedback: None,
        confidence_score: None,
        created_at: now_rfc3339(),
    })?;

    Ok(issue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_header_is_basic_base64() {
        let client = JiraClient::new("https://acme.atlassian.net", "a@b.c", "tok");
        let expected = format!(
            "Basic {}",
            general_purpose::STANDARD.encode("a@b.c:tok")
        );
        assert_eq!(client.auth_header.as_str(), expected.as_str());
    }

    #[test]
    fn test_from_integration_requires_full_config() {
        let incomplete = IntegrationRecord {
            provider: "jira".to_string(),
            config: serde_json::json!({"domain": "acme.atlassian.net"}),
            secret: "tok".to_string(),
        };
        assert!(matches!(
            JiraClient::from_integration(&incomplete),
            Err(JiraError::NotConfigured)
        ));

        let complete = IntegrationRecord {
            provider: "jira".to_string(),
            config: serde_json::json!({
                "domain": "acme.atlassian.net",
                "email": "a@b.c",
                "project_key": "SEC"
            }),
            secret: "tok".to_string(),
        };
        let (client, project_key) = JiraClient::from_integration(&complete).unwrap();
        assert_eq!(project_key, "SEC");
        assert_eq!(client.base_url, "https://acme.atlassian.net");
    }
}
