//! Jira ticket plugin.
//!
//! Creates Jira tickets for alerts that match a configured trigger, and
//! exposes manual actions to attach, detach, or re-create the ticket
//! association. Deleting an alert closes its linked ticket through the
//! configured workflow transition.

use crate::config::{ConfigError, JiraPluginConfig, TriggerAssignee, TriggerRule};
use aw_connectors::{
    escape_jql_value, AuthConfig, ConnectorConfig, ConnectorResult, CreateIssueRequest,
    JiraConfig, JiraConnector, TicketingConnector,
};
use aw_core::{Alert, MatchPolicy, Plugin, PluginResult};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Attribute key under which the ticket association is stored.
const JIRA_ATTRIBUTE: &str = "jira";

/// Alert statuses that never trigger ticket creation.
const SKIP_STATUSES: &[&str] = &["ack", "closed", "shelved"];

/// Action names dispatched through `take_action`.
const ACTION_CREATE: &str = "createJira";
const ACTION_ATTACH: &str = "attachJira";
const ACTION_DETACH: &str = "detachJira";

/// Jira plugin driving ticket automation from alert lifecycle hooks.
pub struct JiraPlugin {
    config: JiraPluginConfig,
    connector: Arc<dyn TicketingConnector>,
    policy: MatchPolicy,
}

impl JiraPlugin {
    /// Creates the plugin, validating the configuration and building the
    /// Jira connector from it. Configuration errors are fatal.
    pub fn new(config: JiraPluginConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let connector_config = ConnectorConfig {
            name: "jira".to_string(),
            base_url: config.url.clone(),
            auth: AuthConfig::Basic {
                username: config.user.clone(),
                password: config.api_token.clone(),
            },
            timeout_secs: 30,
            max_retries: 3,
            verify_tls: true,
            headers: HashMap::new(),
        };
        let connector = JiraConnector::new(JiraConfig {
            connector: connector_config,
            is_server: false,
        })
        .map_err(|e| ConfigError::Connector(e.to_string()))?;

        Ok(Self {
            config,
            connector: Arc::new(connector),
            policy: MatchPolicy::default(),
        })
    }

    /// Creates the plugin against an explicit connector. Used by tests and
    /// by hosts that manage connector construction themselves.
    pub fn with_connector(
        config: JiraPluginConfig,
        connector: Arc<dyn TicketingConnector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            connector,
            policy: MatchPolicy::default(),
        })
    }

    /// Overrides the match policy used for trigger evaluation.
    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// First trigger whose rule matches the alert, in declaration order.
    fn first_matching_trigger(&self, alert: &Alert) -> Option<&TriggerRule> {
        self.config.triggers.iter().find(|trigger| {
            match trigger.matches.matches(alert, self.policy) {
                Ok(matched) => matched,
                Err(err) => {
                    warn!(%err, "skipping trigger with invalid pattern");
                    false
                }
            }
        })
    }

    /// Host part of the alert resource, up to the first `:`.
    fn host_of(alert: &Alert) -> &str {
        alert.resource.split(':').next().unwrap_or(&alert.resource)
    }

    /// Short event name, the last `.`-separated segment.
    fn short_event(alert: &Alert) -> &str {
        alert.event.rsplit('.').next().unwrap_or(&alert.event)
    }

    fn summary_for(alert: &Alert) -> String {
        format!(
            "Server {}: alert {} in event {} - Severity: {}",
            Self::host_of(alert).to_uppercase(),
            alert.id.to_uppercase(),
            Self::short_event(alert).to_uppercase(),
            alert.severity.to_uppercase()
        )
    }

    fn description_for(alert: &Alert) -> String {
        format!(
            "The event {} INFO: {}. \nVALUE: {}.",
            Self::short_event(alert),
            alert.text,
            alert.value
        )
    }

    /// Creates the ticket and writes the association back onto the alert.
    async fn create_ticket(
        &self,
        mut alert: Alert,
        assignee: &TriggerAssignee,
    ) -> ConnectorResult<Alert> {
        info!(alert_id = %alert.id, project = %assignee.project, "creating Jira ticket for alert");

        let issue = self
            .connector
            .create_issue(CreateIssueRequest {
                project_key: assignee.project.clone(),
                summary: Self::summary_for(&alert),
                description: Self::description_for(&alert),
                issue_type: assignee.issue_type.clone(),
                labels: vec![],
                custom_fields: HashMap::new(),
            })
            .await?;

        let mut association = json!({
            "key": issue.key,
            "url": issue.url,
            "id": issue.id,
        });

        if let Some(user) = &assignee.user {
            self.connector.assign_issue(&issue.key, user).await?;
            association["user"] = json!(user);
        }

        alert
            .attributes
            .insert(JIRA_ATTRIBUTE.to_string(), association);
        Ok(alert)
    }

    /// Whether an open ticket for this host/event pair already exists.
    ///
    /// The query uses the same fields the ticket summary is built from, so
    /// a previously created ticket is always found again.
    async fn has_open_duplicate(&self, alert: &Alert) -> ConnectorResult<bool> {
        let jql = format!(
            "summary ~ \"{}\" AND summary ~ \"{}\" AND NOT status = \"To Do\"",
            escape_jql_value(Self::host_of(alert)),
            escape_jql_value(Self::short_event(alert))
        );
        let issues = self.connector.search(&jql, 10).await?;
        Ok(!issues.is_empty())
    }

    /// The key of the ticket currently attached to the alert, if any.
    fn attached_key(alert: &Alert) -> Option<&str> {
        alert
            .attributes
            .get(JIRA_ATTRIBUTE)
            .and_then(|v| v.get("key"))
            .and_then(|k| k.as_str())
    }

    /// Trigger evaluation and ticket creation for one alert; `None` means
    /// nothing to do.
    async fn process_post_receive(&self, alert: &Alert) -> ConnectorResult<Option<Alert>> {
        if SKIP_STATUSES.contains(&alert.status.as_str()) || alert.duplicate_count > 0 {
            debug!(
                alert_id = %alert.id,
                status = %alert.status,
                duplicate_count = alert.duplicate_count,
                "alert ignored for ticket creation"
            );
            return Ok(None);
        }

        let Some(trigger) = self.first_matching_trigger(alert) else {
            return Ok(None);
        };

        if self.has_open_duplicate(alert).await? {
            info!(
                resource = %alert.resource,
                event = %alert.event,
                "ticket already exists for resource and event, not creating a new one"
            );
            return Ok(None);
        }

        self.create_ticket(alert.clone(), &trigger.assignee)
            .await
            .map(Some)
    }

    /// Verifies the issue exists, then attaches it to the alert.
    async fn attach(&self, mut alert: Alert, key: &str) -> Alert {
        debug!(key, "attach issue, looking up key");
        match self.connector.get_issue(key).await {
            Ok(issue) => {
                alert.attributes.insert(
                    JIRA_ATTRIBUTE.to_string(),
                    json!({
                        "key": issue.key,
                        "url": issue.url,
                        "id": issue.id,
                    }),
                );
                alert
            }
            Err(err) => {
                debug!(key, %err, "Jira issue not found, leaving alert unchanged");
                alert
            }
        }
    }

    /// Extracts an issue key from a raw payload: either the key itself or a
    /// browse URL whose last path segment is the key.
    fn key_from_payload(payload: &str) -> &str {
        let payload = payload.trim();
        if payload.starts_with("https:") || payload.starts_with("http:") {
            payload.rsplit('/').next().unwrap_or(payload)
        } else {
            payload
        }
    }
}

#[async_trait]
impl Plugin for JiraPlugin {
    fn name(&self) -> &str {
        "jira"
    }

    async fn post_receive(&self, alert: Alert) -> PluginResult<Alert> {
        match self.process_post_receive(&alert).await {
            Ok(Some(updated)) => Ok(updated),
            Ok(None) => Ok(alert),
            Err(err) => {
                // Remote failures never block the pipeline; the alert goes
                // back unmodified.
                error!(alert_id = %alert.id, %err, "failed to create Jira ticket");
                Ok(alert)
            }
        }
    }

    async fn status_change(
        &self,
        alert: Alert,
        status: String,
        text: String,
    ) -> PluginResult<(Alert, String, String)> {
        debug!(alert_id = %alert.id, %status, %text, "status change");
        Ok((alert, status, text))
    }

    async fn take_action(&self, alert: Alert, action: &str, payload: &str) -> PluginResult<Alert> {
        debug!(alert_id = %alert.id, action, "take action");
        match action {
            ACTION_CREATE => {
                let assignee: TriggerAssignee = match serde_json::from_str(payload) {
                    Ok(assignee) => assignee,
                    Err(err) => {
                        warn!(%err, "createJira payload is not a valid assignee, ignoring");
                        return Ok(alert);
                    }
                };
                match self.create_ticket(alert.clone(), &assignee).await {
                    Ok(updated) => Ok(updated),
                    Err(err) => {
                        error!(alert_id = %alert.id, %err, "createJira action failed");
                        Ok(alert)
                    }
                }
            }
            ACTION_ATTACH => {
                let key = Self::key_from_payload(payload);
                Ok(self.attach(alert, key).await)
            }
            ACTION_DETACH => {
                let requested = serde_json::from_str::<serde_json::Value>(payload)
                    .ok()
                    .and_then(|v| v.get("key").and_then(|k| k.as_str()).map(str::to_string));
                let Some(requested) = requested else {
                    warn!("detachJira payload has no key, ignoring");
                    return Ok(alert);
                };

                if Self::attached_key(&alert) == Some(requested.as_str()) {
                    let mut updated = alert;
                    updated.attributes.remove(JIRA_ATTRIBUTE);
                    Ok(updated)
                } else {
                    warn!(
                        requested = %requested,
                        "detachJira key does not match attached ticket, ignoring"
                    );
                    Ok(alert)
                }
            }
            _ => Ok(alert),
        }
    }

    async fn delete(&self, alert: &Alert) -> PluginResult<bool> {
        let Some(key) = Self::attached_key(alert) else {
            return Ok(false);
        };

        let closed = async {
            let issue = self.connector.get_issue(key).await?;
            let transitions = self.connector.transitions(&issue.key).await?;
            let Some(transition) = transitions
                .iter()
                .find(|t| t.name == self.config.finished_transition)
            else {
                debug!(
                    key = %issue.key,
                    wanted = %self.config.finished_transition,
                    "no finishing transition available on issue"
                );
                return Ok(false);
            };

            self.connector
                .add_comment(
                    &issue.key,
                    &format!("Alert {} deleted, closing jira ticket", alert.id),
                )
                .await?;
            self.connector
                .transition_issue(&issue.key, &transition.id)
                .await?;
            info!(key = %issue.key, "closed issue");
            ConnectorResult::Ok(true)
        }
        .await;

        match closed {
            Ok(done) => Ok(done),
            Err(err) => {
                error!(alert_id = %alert.id, key, %err, "failed to close Jira ticket on delete");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert() -> Alert {
        Alert {
            id: "a-42".to_string(),
            resource: "web01:nginx".to_string(),
            event: "checks.http500".to_string(),
            severity: "critical".to_string(),
            text: "5xx rate above threshold".to_string(),
            value: "97".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_summary_format() {
        assert_eq!(
            JiraPlugin::summary_for(&alert()),
            "Server WEB01: alert A-42 in event HTTP500 - Severity: CRITICAL"
        );
    }

    #[test]
    fn test_description_format() {
        assert_eq!(
            JiraPlugin::description_for(&alert()),
            "The event http500 INFO: 5xx rate above threshold. \nVALUE: 97."
        );
    }

    #[test]
    fn test_host_without_port_separator() {
        let mut a = alert();
        a.resource = "db01".to_string();
        assert_eq!(JiraPlugin::host_of(&a), "db01");
    }

    #[test]
    fn test_key_from_payload() {
        assert_eq!(JiraPlugin::key_from_payload("OPS-12"), "OPS-12");
        assert_eq!(
            JiraPlugin::key_from_payload("https://example.atlassian.net/browse/OPS-12"),
            "OPS-12"
        );
        assert_eq!(
            JiraPlugin::key_from_payload("http://jira.local/browse/OPS-12"),
            "OPS-12"
        );
        assert_eq!(JiraPlugin::key_from_payload("  OPS-12  "), "OPS-12");
    }

    #[test]
    fn test_attached_key() {
        let mut a = alert();
        assert_eq!(JiraPlugin::attached_key(&a), None);

        a.attributes.insert(
            JIRA_ATTRIBUTE.to_string(),
            json!({"key": "OPS-7", "url": "u", "id": "1"}),
        );
        assert_eq!(JiraPlugin::attached_key(&a), Some("OPS-7"));
    }
}
