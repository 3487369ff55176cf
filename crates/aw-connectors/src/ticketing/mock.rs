//! Mock ticketing connector for testing.

use crate::traits::{
    Connector, ConnectorError, ConnectorHealth, ConnectorResult, CreateIssueRequest, Issue,
    TicketingConnector, Transition,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory ticketing connector backing plugin tests.
pub struct MockTicketingConnector {
    name: String,
    issues: Arc<RwLock<HashMap<String, Issue>>>,
    comments: Arc<RwLock<Vec<(String, String)>>>,
    assignments: Arc<RwLock<HashMap<String, String>>>,
    transitions: Vec<Transition>,
    counter: AtomicU64,
}

impl MockTicketingConnector {
    /// Creates a mock with a default workflow (a single "Done" transition).
    pub fn new(name: &str) -> Self {
        Self::with_transitions(
            name,
            vec![Transition {
                id: "31".to_string(),
                name: "Done".to_string(),
            }],
        )
    }

    /// Creates a mock advertising the given workflow transitions.
    pub fn with_transitions(name: &str, transitions: Vec<Transition>) -> Self {
        Self {
            name: name.to_string(),
            issues: Arc::new(RwLock::new(HashMap::new())),
            comments: Arc::new(RwLock::new(Vec::new())),
            assignments: Arc::new(RwLock::new(HashMap::new())),
            transitions,
            counter: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Seeds an existing issue, for duplicate-guard tests.
    pub async fn seed_issue(&self, key: &str, summary: &str, status: &str) {
        let issue = Issue {
            id: format!("id-{}", key),
            key: key.to_string(),
            summary: summary.to_string(),
            status: status.to_string(),
            url: format!("https://mock.jira.example.com/browse/{}", key),
        };
        self.issues.write().await.insert(key.to_string(), issue);
    }

    /// Comments recorded as `(issue_key, body)` pairs.
    pub async fn comments(&self) -> Vec<(String, String)> {
        self.comments.read().await.clone()
    }

    /// Current assignee of an issue, if any.
    pub async fn assignee_of(&self, key: &str) -> Option<String> {
        self.assignments.read().await.get(key).cloned()
    }

    /// Current status of an issue, if it exists.
    pub async fn status_of(&self, key: &str) -> Option<String> {
        self.issues.read().await.get(key).map(|i| i.status.clone())
    }

    /// Number of issues created or seeded.
    pub async fn issue_count(&self) -> usize {
        self.issues.read().await.len()
    }

    /// Quoted values of `summary ~ "..."` clauses; the mock's stand-in for
    /// query parsing.
    fn summary_phrases(query: &str) -> Vec<String> {
        const CLAUSE: &str = "summary ~ \"";
        let mut phrases = Vec::new();
        let mut rest = query;
        while let Some(idx) = rest.find(CLAUSE) {
            let after = &rest[idx + CLAUSE.len()..];
            let Some(end) = after.find('"') else { break };
            phrases.push(after[..end].replace('\\', ""));
            rest = &after[end + 1..];
        }
        phrases
    }
}

#[async_trait]
impl Connector for MockTicketingConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn connector_type(&self) -> &str {
        "ticketing"
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        Ok(ConnectorHealth::Healthy)
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl TicketingConnector for MockTicketingConnector {
    async fn create_issue(&self, request: CreateIssueRequest) -> ConnectorResult<Issue> {
        let id = self.next_id();
        let key = format!("{}-{}", request.project_key, id);

        let issue = Issue {
            id: id.to_string(),
            key: key.clone(),
            summary: request.summary,
            status: "Open".to_string(),
            url: self.issue_url(&key),
        };

        self.issues.write().await.insert(key, issue.clone());
        Ok(issue)
    }

    async fn get_issue(&self, key: &str) -> ConnectorResult<Issue> {
        self.issues
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ConnectorError::NotFound(format!("Issue {} not found", key)))
    }

    async fn assign_issue(&self, key: &str, assignee: &str) -> ConnectorResult<()> {
        if !self.issues.read().await.contains_key(key) {
            return Err(ConnectorError::NotFound(format!("Issue {} not found", key)));
        }
        self.assignments
            .write()
            .await
            .insert(key.to_string(), assignee.to_string());
        Ok(())
    }

    async fn add_comment(&self, key: &str, comment: &str) -> ConnectorResult<()> {
        if !self.issues.read().await.contains_key(key) {
            return Err(ConnectorError::NotFound(format!("Issue {} not found", key)));
        }
        self.comments
            .write()
            .await
            .push((key.to_string(), comment.to_string()));
        Ok(())
    }

    async fn transitions(&self, key: &str) -> ConnectorResult<Vec<Transition>> {
        if !self.issues.read().await.contains_key(key) {
            return Err(ConnectorError::NotFound(format!("Issue {} not found", key)));
        }
        Ok(self.transitions.clone())
    }

    async fn transition_issue(&self, key: &str, transition_id: &str) -> ConnectorResult<()> {
        let transition = self
            .transitions
            .iter()
            .find(|t| t.id == transition_id)
            .ok_or_else(|| {
                ConnectorError::RequestFailed(format!("No transition {}", transition_id))
            })?;

        let mut issues = self.issues.write().await;
        let issue = issues
            .get_mut(key)
            .ok_or_else(|| ConnectorError::NotFound(format!("Issue {} not found", key)))?;
        issue.status = transition.name.clone();
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> ConnectorResult<Vec<Issue>> {
        let phrases = Self::summary_phrases(query);
        let issues = self.issues.read().await;
        // Text search in the tracker is case-insensitive, the mock follows.
        let results = issues
            .values()
            .filter(|issue| {
                let summary = issue.summary.to_lowercase();
                phrases.iter().all(|p| summary.contains(&p.to_lowercase()))
            })
            .filter(|issue| issue.status != "Done")
            .take(limit)
            .cloned()
            .collect();
        Ok(results)
    }

    fn issue_url(&self, key: &str) -> String {
        format!("https://mock.jira.example.com/browse/{}", key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request(summary: &str) -> CreateIssueRequest {
        CreateIssueRequest {
            project_key: "OPS".to_string(),
            summary: summary.to_string(),
            description: "details".to_string(),
            issue_type: "Task".to_string(),
            labels: vec![],
            custom_fields: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_issue() {
        let connector = MockTicketingConnector::new("mock");
        let created = connector.create_issue(request("disk full")).await.unwrap();
        assert_eq!(created.key, "OPS-1");
        assert_eq!(created.status, "Open");

        let fetched = connector.get_issue(&created.key).await.unwrap();
        assert_eq!(fetched.summary, "disk full");
    }

    #[tokio::test]
    async fn test_transition_by_id_updates_status() {
        let connector = MockTicketingConnector::new("mock");
        let created = connector.create_issue(request("disk full")).await.unwrap();

        let transitions = connector.transitions(&created.key).await.unwrap();
        connector
            .transition_issue(&created.key, &transitions[0].id)
            .await
            .unwrap();
        assert_eq!(connector.status_of(&created.key).await.unwrap(), "Done");
    }

    #[tokio::test]
    async fn test_search_matches_all_quoted_phrases() {
        let connector = MockTicketingConnector::new("mock");
        connector
            .create_issue(request("Server WEB01: alert A1 in event HTTP500"))
            .await
            .unwrap();
        connector
            .create_issue(request("Server DB01: alert A2 in event DISK"))
            .await
            .unwrap();

        let hits = connector
            .search("summary ~ \"WEB01\" AND summary ~ \"HTTP500\"", 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let misses = connector
            .search("summary ~ \"WEB01\" AND summary ~ \"DISK\"", 10)
            .await
            .unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn test_search_excludes_done_issues() {
        let connector = MockTicketingConnector::new("mock");
        connector.seed_issue("OPS-9", "old alert", "Done").await;

        let hits = connector.search("summary ~ \"old alert\"", 10).await.unwrap();
        assert!(hits.is_empty());
    }
}
