//! Plugin lifecycle contract.
//!
//! Mirrors the host's hook pipeline: each hook receives the alert by value
//! and hands back what the host should continue with. Every hook defaults
//! to a pass-through so a plugin only implements the stages it cares
//! about.

use crate::alert::Alert;
use crate::blackout::StoreError;
use crate::matcher::MatchError;
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced to the host by a plugin hook.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("plugin configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("external call failed: {0}")]
    External(String),
}

/// Result type for plugin hooks.
pub type PluginResult<T> = Result<T, PluginError>;

/// Outcome of the pre-receive filter step.
///
/// Suppression is an explicit outcome rather than an unwound exception, so
/// the host can decide how to abort the receive pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterDecision {
    /// Let the alert continue through the pipeline.
    Continue(Alert),
    /// Drop the alert before it reaches the database.
    Suppress {
        /// Why the alert was dropped, for the host's logs.
        reason: String,
    },
}

impl FilterDecision {
    /// Whether the decision suppresses the alert.
    pub fn is_suppressed(&self) -> bool {
        matches!(self, FilterDecision::Suppress { .. })
    }

    /// The alert, when the pipeline continues.
    pub fn into_alert(self) -> Option<Alert> {
        match self {
            FilterDecision::Continue(alert) => Some(alert),
            FilterDecision::Suppress { .. } => None,
        }
    }
}

/// Lifecycle hooks invoked by the host around alert processing.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name used in logs and registries.
    fn name(&self) -> &str;

    /// Runs before the alert is persisted; may suppress it outright.
    async fn pre_receive(&self, alert: Alert) -> PluginResult<FilterDecision> {
        Ok(FilterDecision::Continue(alert))
    }

    /// Runs after the alert has been persisted and correlated.
    async fn post_receive(&self, alert: Alert) -> PluginResult<Alert> {
        Ok(alert)
    }

    /// Runs when an alert's status changes outside the receive path.
    async fn status_change(
        &self,
        alert: Alert,
        status: String,
        text: String,
    ) -> PluginResult<(Alert, String, String)> {
        Ok((alert, status, text))
    }

    /// Dispatches a named action with a free-form payload.
    async fn take_action(&self, alert: Alert, action: &str, payload: &str) -> PluginResult<Alert> {
        let _ = (action, payload);
        Ok(alert)
    }

    /// Runs when the alert is deleted; returns whether the plugin acted.
    async fn delete(&self, alert: &Alert) -> PluginResult<bool> {
        let _ = alert;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopPlugin;

    impl Plugin for NoopPlugin {
        fn name(&self) -> &str {
            "noop"
        }
    }

    #[tokio::test]
    async fn test_default_hooks_pass_through() {
        let plugin = NoopPlugin;
        let alert = Alert {
            id: "a1".to_string(),
            ..Default::default()
        };

        let decision = plugin.pre_receive(alert.clone()).await.unwrap();
        assert_eq!(decision, FilterDecision::Continue(alert.clone()));

        let out = plugin.post_receive(alert.clone()).await.unwrap();
        assert_eq!(out.id, "a1");

        let (_, status, text) = plugin
            .status_change(alert.clone(), "ack".to_string(), "noted".to_string())
            .await
            .unwrap();
        assert_eq!(status, "ack");
        assert_eq!(text, "noted");

        let out = plugin.take_action(alert.clone(), "unknown", "{}").await.unwrap();
        assert_eq!(out.id, "a1");

        assert!(!plugin.delete(&alert).await.unwrap());
    }

    #[test]
    fn test_filter_decision_accessors() {
        let alert = Alert::default();
        let cont = FilterDecision::Continue(alert);
        assert!(!cont.is_suppressed());
        assert!(cont.into_alert().is_some());

        let suppressed = FilterDecision::Suppress {
            reason: "blackout".to_string(),
        };
        assert!(suppressed.is_suppressed());
        assert!(suppressed.into_alert().is_none());
    }
}
