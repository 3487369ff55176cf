//! Connector trait definitions.
//!
//! The interfaces the plugins program against when talking to an external
//! issue tracker, kept independent of any concrete tracker API.

use crate::secure_string::SecureString;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur in connectors.
#[derive(Error, Debug, Clone)]
pub enum ConnectorError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Health status of a connector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorHealth {
    /// Connector is healthy and operational.
    Healthy,
    /// Connector is degraded but still functional.
    Degraded(String),
    /// Connector is unhealthy and not operational.
    Unhealthy(String),
}

/// Configuration shared by all connectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector name/identifier.
    pub name: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum retries.
    pub max_retries: u32,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
    /// Additional headers to include.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Authentication configuration.
///
/// Credential fields use [`SecureString`] so sensitive data is zeroized
/// from memory when no longer needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication.
    None,
    /// API key sent in a named header.
    ApiKey {
        key: SecureString,
        header_name: String,
    },
    /// Bearer token authentication.
    BearerToken { token: SecureString },
    /// Basic authentication.
    Basic {
        username: String,
        password: SecureString,
    },
}

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the connector name.
    fn name(&self) -> &str;

    /// Returns the connector type (e.g. "ticketing").
    fn connector_type(&self) -> &str;

    /// Checks the health of the connector.
    async fn health_check(&self) -> ConnectorResult<ConnectorHealth>;

    /// Tests the connection to the external system.
    async fn test_connection(&self) -> ConnectorResult<bool>;
}

/// An issue in the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Tracker-internal id.
    pub id: String,
    /// Issue key (e.g. "OPS-123").
    pub key: String,
    /// Issue summary.
    pub summary: String,
    /// Current workflow status name.
    pub status: String,
    /// URL to view the issue.
    pub url: String,
}

/// Request to create an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIssueRequest {
    /// Project the issue is filed under.
    pub project_key: String,
    /// Issue summary.
    pub summary: String,
    /// Issue description.
    pub description: String,
    /// Issue type name (e.g. "Task", "Incident").
    pub issue_type: String,
    /// Labels to attach.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Custom fields keyed by tracker field id.
    #[serde(default)]
    pub custom_fields: HashMap<String, serde_json::Value>,
}

/// A workflow transition available on an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    /// Transition id, used to execute it.
    pub id: String,
    /// Transition name, used to select it.
    pub name: String,
}

/// Issue tracker connector (Jira and compatible systems).
#[async_trait]
pub trait TicketingConnector: Connector {
    /// Creates a new issue.
    async fn create_issue(&self, request: CreateIssueRequest) -> ConnectorResult<Issue>;

    /// Gets an issue by key.
    async fn get_issue(&self, key: &str) -> ConnectorResult<Issue>;

    /// Assigns an issue to a user.
    async fn assign_issue(&self, key: &str, assignee: &str) -> ConnectorResult<()>;

    /// Adds a comment to an issue.
    async fn add_comment(&self, key: &str, comment: &str) -> ConnectorResult<()>;

    /// Lists the workflow transitions currently available on an issue.
    async fn transitions(&self, key: &str) -> ConnectorResult<Vec<Transition>>;

    /// Executes a workflow transition on an issue.
    async fn transition_issue(&self, key: &str, transition_id: &str) -> ConnectorResult<()>;

    /// Searches for issues with a tracker-native query, bounded by `limit`.
    async fn search(&self, query: &str, limit: usize) -> ConnectorResult<Vec<Issue>>;

    /// Browse URL for an issue key.
    fn issue_url(&self, key: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_config_serde_is_tagged() {
        let auth = AuthConfig::Basic {
            username: "svc@example.com".to_string(),
            password: SecureString::from("token"),
        };
        let json = serde_json::to_value(&auth).unwrap();
        assert_eq!(json["type"], "basic");
        assert_eq!(json["username"], "svc@example.com");
    }

    #[test]
    fn test_create_issue_request_defaults() {
        let request: CreateIssueRequest = serde_json::from_value(serde_json::json!({
            "project_key": "OPS",
            "summary": "disk full",
            "description": "details",
            "issue_type": "Task"
        }))
        .unwrap();
        assert!(request.labels.is_empty());
        assert!(request.custom_fields.is_empty());
    }
}
