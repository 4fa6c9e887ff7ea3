//! External collaborators: issue tracker and VCS host

pub mod github;
pub mod jira;

pub use github::{AccountType, GitHubClient, GitHubError, MfaScan};
pub use jira::{CreatedIssue, JiraClient, JiraError, JiraRequestConfig};
