//! Jira ticketing connector.
//!
//! Talks to Jira Cloud (REST API v3) or Jira Server (v2). Covers the
//! operations the alert plugins drive: issue creation, lookup, assignment,
//! comments, workflow transitions, and JQL search.

use crate::http::{HttpClient, RateLimitConfig};
use crate::traits::{
    Connector, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult,
    CreateIssueRequest, Issue, TicketingConnector, Transition,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// JQL characters that must be escaped inside a quoted search value.
const JQL_SPECIAL_CHARS: &[char] = &[
    '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', ':', '\\',
];

/// Escapes a value for interpolation into a double-quoted JQL string.
///
/// Special characters are backslash-escaped and the wildcard characters
/// `*` and `?` are stripped so interpolated alert fields cannot widen the
/// query.
pub fn escape_jql_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 2);
    for c in value.chars() {
        if matches!(c, '*' | '?') {
            continue;
        }
        if JQL_SPECIAL_CHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Jira-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    /// Base connector configuration.
    #[serde(flatten)]
    pub connector: ConnectorConfig,
    /// Whether this is Jira Server (vs Cloud). Affects API paths and
    /// payload formats.
    #[serde(default)]
    pub is_server: bool,
}

/// Jira connector.
pub struct JiraConnector {
    config: JiraConfig,
    client: HttpClient,
}

impl JiraConnector {
    /// Creates a new Jira connector.
    pub fn new(config: JiraConfig) -> ConnectorResult<Self> {
        // Jira Cloud rate limits are generous but we add some protection.
        let rate_limit = RateLimitConfig {
            max_requests: 100,
            period: Duration::from_secs(60),
            burst_size: 20,
        };

        let client = HttpClient::with_rate_limit(config.connector.clone(), Some(rate_limit))?;

        info!(
            base_url = %config.connector.base_url,
            deployment = if config.is_server { "server" } else { "cloud" },
            "Jira connector initialized"
        );

        Ok(Self { config, client })
    }

    /// Build the API path for the configured Jira deployment.
    fn api_path(&self, path: &str) -> String {
        if self.config.is_server {
            format!("/rest/api/2{}", path)
        } else {
            format!("/rest/api/3{}", path)
        }
    }

    fn parse_issue(&self, issue: JiraIssue) -> Issue {
        Issue {
            id: issue.id,
            url: self.issue_url(&issue.key),
            summary: issue.fields.summary,
            status: issue.fields.status.name,
            key: issue.key,
        }
    }

    /// Description payload in the format the deployment expects: plain text
    /// for Server, Atlassian Document Format for Cloud.
    fn description_body(&self, text: &str) -> serde_json::Value {
        if self.config.is_server {
            serde_json::json!(text)
        } else {
            serde_json::json!(AdfDocument::text(text))
        }
    }

    async fn error_body(response: reqwest::Response) -> String {
        response.text().await.unwrap_or_default()
    }
}

#[async_trait]
impl Connector for JiraConnector {
    fn name(&self) -> &str {
        &self.config.connector.name
    }

    fn connector_type(&self) -> &str {
        "ticketing"
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        let path = self.api_path("/myself");
        match self.client.get(&path).await {
            Ok(response) if response.status().is_success() => Ok(ConnectorHealth::Healthy),
            Ok(response) => Ok(ConnectorHealth::Degraded(format!(
                "Unexpected status: {}",
                response.status()
            ))),
            Err(ConnectorError::AuthenticationFailed(e)) => Ok(ConnectorHealth::Unhealthy(
                format!("Authentication failed: {}", e),
            )),
            Err(ConnectorError::ConnectionFailed(e)) => Ok(ConnectorHealth::Unhealthy(format!(
                "Connection failed: {}",
                e
            ))),
            Err(e) => Ok(ConnectorHealth::Unhealthy(e.to_string())),
        }
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        let path = self.api_path("/myself");
        let response = self.client.get(&path).await?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl TicketingConnector for JiraConnector {
    #[instrument(skip(self, request), fields(summary = %request.summary))]
    async fn create_issue(&self, request: CreateIssueRequest) -> ConnectorResult<Issue> {
        let mut fields = serde_json::json!({
            "project": { "key": request.project_key },
            "summary": request.summary,
            "issuetype": { "name": request.issue_type },
        });

        if !request.description.is_empty() {
            fields["description"] = self.description_body(&request.description);
        }
        if !request.labels.is_empty() {
            fields["labels"] = serde_json::json!(request.labels);
        }
        for (field_id, value) in &request.custom_fields {
            fields[field_id] = value.clone();
        }

        let body = serde_json::json!({ "fields": fields });
        let response = self.client.post(&self.api_path("/issue"), &body).await?;

        if !response.status().is_success() {
            return Err(ConnectorError::RequestFailed(format!(
                "Failed to create issue: {}",
                Self::error_body(response).await
            )));
        }

        let created: JiraCreateResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

        info!(key = %created.key, id = %created.id, "created Jira issue");

        self.get_issue(&created.key).await
    }

    #[instrument(skip(self))]
    async fn get_issue(&self, key: &str) -> ConnectorResult<Issue> {
        let path = self.api_path(&format!("/issue/{}", key));
        let response = self.client.get(&path).await.map_err(|e| match e {
            ConnectorError::NotFound(_) => {
                ConnectorError::NotFound(format!("Issue {} not found", key))
            }
            other => other,
        })?;

        let issue: JiraIssue = response
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

        Ok(self.parse_issue(issue))
    }

    #[instrument(skip(self))]
    async fn assign_issue(&self, key: &str, assignee: &str) -> ConnectorResult<()> {
        let body = if self.config.is_server {
            serde_json::json!({ "name": assignee })
        } else {
            serde_json::json!({ "accountId": assignee })
        };

        let path = self.api_path(&format!("/issue/{}/assignee", key));
        let response = self.client.put(&path, &body).await?;

        if !response.status().is_success() {
            return Err(ConnectorError::RequestFailed(format!(
                "Failed to assign issue: {}",
                Self::error_body(response).await
            )));
        }

        debug!(key, assignee, "assigned issue");
        Ok(())
    }

    #[instrument(skip(self, comment))]
    async fn add_comment(&self, key: &str, comment: &str) -> ConnectorResult<()> {
        let body = serde_json::json!({ "body": self.description_body(comment) });

        let path = self.api_path(&format!("/issue/{}/comment", key));
        let response = self.client.post(&path, &body).await?;

        if !response.status().is_success() {
            return Err(ConnectorError::RequestFailed(format!(
                "Failed to add comment: {}",
                Self::error_body(response).await
            )));
        }

        debug!(key, "added comment");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn transitions(&self, key: &str) -> ConnectorResult<Vec<Transition>> {
        let path = self.api_path(&format!("/issue/{}/transitions", key));
        let response = self.client.get(&path).await?;

        let body: JiraTransitionsResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

        Ok(body
            .transitions
            .into_iter()
            .map(|t| Transition {
                id: t.id,
                name: t.name,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn transition_issue(&self, key: &str, transition_id: &str) -> ConnectorResult<()> {
        let body = serde_json::json!({ "transition": { "id": transition_id } });

        let path = self.api_path(&format!("/issue/{}/transitions", key));
        let response = self.client.post(&path, &body).await?;

        if !response.status().is_success() {
            return Err(ConnectorError::RequestFailed(format!(
                "Failed to transition issue: {}",
                Self::error_body(response).await
            )));
        }

        info!(key, transition_id, "transitioned issue");
        Ok(())
    }

    #[instrument(skip(self), fields(jql = %query))]
    async fn search(&self, query: &str, limit: usize) -> ConnectorResult<Vec<Issue>> {
        let body = JiraSearchRequest {
            jql: query.to_string(),
            max_results: limit as u32,
            fields: vec!["summary".to_string(), "status".to_string()],
        };

        let response = self.client.post(&self.api_path("/search"), &body).await?;

        if !response.status().is_success() {
            return Err(ConnectorError::RequestFailed(format!(
                "Search failed: {}",
                Self::error_body(response).await
            )));
        }

        let result: JiraSearchResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

        Ok(result
            .issues
            .into_iter()
            .map(|i| self.parse_issue(i))
            .collect())
    }

    fn issue_url(&self, key: &str) -> String {
        format!(
            "{}/browse/{}",
            self.client.base_url().trim_end_matches('/'),
            key
        )
    }
}

// Jira API types

#[derive(Debug, Deserialize)]
struct JiraIssue {
    id: String,
    key: String,
    fields: JiraIssueFields,
}

#[derive(Debug, Deserialize)]
struct JiraIssueFields {
    summary: String,
    status: JiraStatus,
}

#[derive(Debug, Deserialize)]
struct JiraStatus {
    name: String,
}

#[derive(Debug, Deserialize)]
struct JiraCreateResponse {
    id: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct JiraTransitionsResponse {
    transitions: Vec<JiraTransitionDetail>,
}

#[derive(Debug, Deserialize)]
struct JiraTransitionDetail {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct JiraSearchRequest {
    jql: String,
    #[serde(rename = "maxResults")]
    max_results: u32,
    fields: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JiraSearchResponse {
    issues: Vec<JiraIssue>,
}

/// Atlassian Document Format wrapper for rich-text fields on Jira Cloud.
#[derive(Debug, Serialize)]
struct AdfDocument {
    #[serde(rename = "type")]
    doc_type: &'static str,
    version: u32,
    content: Vec<AdfParagraph>,
}

#[derive(Debug, Serialize)]
struct AdfParagraph {
    #[serde(rename = "type")]
    node_type: &'static str,
    content: Vec<AdfText>,
}

#[derive(Debug, Serialize)]
struct AdfText {
    #[serde(rename = "type")]
    node_type: &'static str,
    text: String,
}

impl AdfDocument {
    fn text(text: &str) -> Self {
        let mut paragraphs: Vec<AdfParagraph> = text
            .split("\n\n")
            .filter(|p| !p.is_empty())
            .map(|p| AdfParagraph {
                node_type: "paragraph",
                content: vec![AdfText {
                    node_type: "text",
                    text: p.to_string(),
                }],
            })
            .collect();

        if paragraphs.is_empty() {
            paragraphs.push(AdfParagraph {
                node_type: "paragraph",
                content: vec![AdfText {
                    node_type: "text",
                    text: text.to_string(),
                }],
            });
        }

        Self {
            doc_type: "doc",
            version: 1,
            content: paragraphs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secure_string::SecureString;
    use crate::traits::AuthConfig;
    use std::collections::HashMap;

    fn create_test_config(is_server: bool) -> JiraConfig {
        JiraConfig {
            connector: ConnectorConfig {
                name: "jira-test".to_string(),
                base_url: "https://example.atlassian.net".to_string(),
                auth: AuthConfig::Basic {
                    username: "svc@example.com".to_string(),
                    password: SecureString::from("api-token"),
                },
                timeout_secs: 30,
                max_retries: 3,
                verify_tls: true,
                headers: HashMap::new(),
            },
            is_server,
        }
    }

    #[test]
    fn test_api_path_by_deployment() {
        let connector = JiraConnector::new(create_test_config(false)).unwrap();
        assert_eq!(connector.api_path("/issue"), "/rest/api/3/issue");

        let connector = JiraConnector::new(create_test_config(true)).unwrap();
        assert_eq!(connector.api_path("/issue"), "/rest/api/2/issue");
    }

    #[test]
    fn test_issue_url() {
        let connector = JiraConnector::new(create_test_config(false)).unwrap();
        assert_eq!(
            connector.issue_url("OPS-42"),
            "https://example.atlassian.net/browse/OPS-42"
        );
    }

    #[test]
    fn test_description_body_format() {
        let cloud = JiraConnector::new(create_test_config(false)).unwrap();
        let body = cloud.description_body("hello");
        assert_eq!(body["type"], "doc");

        let server = JiraConnector::new(create_test_config(true)).unwrap();
        let body = server.description_body("hello");
        assert_eq!(body, serde_json::json!("hello"));
    }

    #[test]
    fn test_adf_splits_paragraphs() {
        let doc = AdfDocument::text("First paragraph\n\nSecond paragraph");
        assert_eq!(doc.content.len(), 2);
        assert_eq!(doc.content[0].content[0].text, "First paragraph");
        assert_eq!(doc.content[1].content[0].text, "Second paragraph");
    }

    #[test]
    fn test_escape_jql_value_special_chars() {
        assert_eq!(escape_jql_value("web01:nginx"), "web01\\:nginx");
        assert_eq!(escape_jql_value("a+b"), "a\\+b");
        assert_eq!(escape_jql_value("plain text"), "plain text");
    }

    #[test]
    fn test_escape_jql_value_strips_wildcards() {
        assert_eq!(escape_jql_value("http*"), "http");
        assert_eq!(escape_jql_value("wh?t"), "wht");
    }

    #[test]
    fn test_escape_jql_value_quote_breakout() {
        // An embedded quote cannot terminate the surrounding JQL string.
        assert_eq!(escape_jql_value("x\" OR y"), "x\\\" OR y");
    }
}
