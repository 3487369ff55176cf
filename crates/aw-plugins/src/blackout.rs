//! Regex blackout plugin.
//!
//! Extends the host's native blackout mechanism with regex attribute
//! matching. When an alert falls inside a blackout window the plugin
//! either suppresses it before it reaches the database, or, in
//! notification mode, tags it with the matched blackout id and relabels
//! its status as `blackout`.
//!
//! The marker tag `regex_blackout=<id>` carries the match across receive
//! cycles: a tagged alert only re-checks that one blackout instead of
//! rescanning the whole list, and the tag is dropped once the blackout is
//! no longer active.

use crate::config::BlackoutConfig;
use aw_core::{
    Alert, Blackout, BlackoutStore, FilterDecision, MatchPolicy, Plugin, PluginResult,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Prefix of the marker tag pointing at the matched blackout.
pub const BLACKOUT_TAG_PREFIX: &str = "regex_blackout=";

/// Alert statuses the plugin never touches.
const TERMINAL_STATUSES: &[&str] = &["closed", "expired", "shelved"];

/// Blackout plugin evaluating regex rules on every pre-receive.
pub struct BlackoutRegexPlugin {
    config: BlackoutConfig,
    store: Arc<dyn BlackoutStore>,
    policy: MatchPolicy,
}

impl BlackoutRegexPlugin {
    /// Creates the plugin with explicit configuration and the host's
    /// blackout store.
    pub fn new(config: BlackoutConfig, store: Arc<dyn BlackoutStore>) -> Self {
        Self {
            config,
            store,
            policy: MatchPolicy::default(),
        }
    }

    /// Overrides the match policy.
    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetches all blackouts; a store failure degrades to an empty list so
    /// the receive pipeline keeps flowing.
    async fn fetch_blackouts(&self) -> Vec<Blackout> {
        if let Ok(count) = self.store.count().await {
            debug!(count, "blackouts currently open");
        }
        match self.store.find_all().await {
            Ok(blackouts) => blackouts,
            Err(err) => {
                error!(%err, "unable to retrieve blackouts from the store");
                Vec::new()
            }
        }
    }

    /// Re-checks the blackout that previously matched this alert.
    fn recheck(&self, mut alert: Alert, blackout_id: &str, blackouts: &[Blackout]) -> Alert {
        if let Some(blackout) = blackouts.iter().find(|b| b.id == blackout_id) {
            if blackout.is_active() {
                debug!(
                    blackout_id,
                    alert_id = %alert.id,
                    "blackout still active, keeping alert status as blackout"
                );
                if alert.status != "blackout" {
                    alert.status = "blackout".to_string();
                }
                return alert;
            }
        }
        // The blackout is gone or no longer active: drop the marker tag and
        // leave the status alone so the next receive re-evaluates from
        // scratch.
        debug!(
            blackout_id,
            alert_id = %alert.id,
            "blackout no longer active, removing marker tag"
        );
        alert.remove_tags_by_prefix(BLACKOUT_TAG_PREFIX);
        alert
    }
}

#[async_trait]
impl Plugin for BlackoutRegexPlugin {
    fn name(&self) -> &str {
        "blackout-regex"
    }

    async fn pre_receive(&self, mut alert: Alert) -> PluginResult<FilterDecision> {
        if TERMINAL_STATUSES.contains(&alert.status.as_str()) {
            debug!(alert_id = %alert.id, status = %alert.status, "terminal status, ignoring");
            return Ok(FilterDecision::Continue(alert));
        }

        let blackouts = self.fetch_blackouts().await;
        let alert_tags = alert.tag_map();

        // A previous evaluation already matched: only that blackout's
        // current state matters.
        if let Some(blackout_id) = alert_tags.get("regex_blackout") {
            debug!(blackout_id, "re-checking blackout that previously matched");
            return Ok(FilterDecision::Continue(self.recheck(
                alert,
                blackout_id,
                &blackouts,
            )));
        }

        for blackout in &blackouts {
            let matched = match blackout.rule().matches(&alert, self.policy) {
                Ok(matched) => matched,
                Err(err) => {
                    warn!(blackout_id = %blackout.id, %err, "skipping blackout with invalid pattern");
                    continue;
                }
            };
            if !matched {
                continue;
            }

            if !self.config.notification_blackout {
                debug!(
                    alert_id = %alert.id,
                    blackout_id = %blackout.id,
                    "suppressing alert during blackout period"
                );
                return Ok(FilterDecision::Suppress {
                    reason: format!("alert matched regex blackout {}", blackout.id),
                });
            }

            debug!(
                alert_id = %alert.id,
                blackout_id = %blackout.id,
                "alert matches regex blackout, tagging and setting status"
            );
            alert.add_tag(format!("{}{}", BLACKOUT_TAG_PREFIX, blackout.id));
            alert.status = "blackout".to_string();
            return Ok(FilterDecision::Continue(alert));
        }

        Ok(FilterDecision::Continue(alert))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aw_core::{BlackoutStatus, MemoryBlackoutStore, StoreError};

    fn alert() -> Alert {
        Alert {
            id: "a1".to_string(),
            resource: "web01:nginx".to_string(),
            event: "http500".to_string(),
            environment: "Production".to_string(),
            severity: "critical".to_string(),
            status: "open".to_string(),
            tags: vec!["env=production".to_string()],
            ..Default::default()
        }
    }

    fn blackout(id: &str, event: &str) -> Blackout {
        Blackout {
            id: id.to_string(),
            status: BlackoutStatus::Active,
            environment: None,
            group: None,
            event: Some(event.to_string()),
            resource: None,
            service: vec![],
            tags: vec![],
        }
    }

    async fn store_with(blackouts: Vec<Blackout>) -> Arc<MemoryBlackoutStore> {
        let store = Arc::new(MemoryBlackoutStore::new());
        for b in blackouts {
            store.insert(b).await;
        }
        store
    }

    #[tokio::test]
    async fn test_matching_alert_is_suppressed() {
        let store = store_with(vec![blackout("b1", "http(.*)")]).await;
        let plugin = BlackoutRegexPlugin::new(BlackoutConfig::default(), store);

        let decision = plugin.pre_receive(alert()).await.unwrap();
        assert!(decision.is_suppressed());
    }

    #[tokio::test]
    async fn test_non_matching_alert_continues() {
        let store = store_with(vec![blackout("b1", "sms(.*)")]).await;
        let plugin = BlackoutRegexPlugin::new(BlackoutConfig::default(), store);

        let decision = plugin.pre_receive(alert()).await.unwrap();
        let out = decision.into_alert().unwrap();
        assert_eq!(out.status, "open");
        assert!(out.tags.iter().all(|t| !t.starts_with(BLACKOUT_TAG_PREFIX)));
    }

    #[tokio::test]
    async fn test_notification_mode_tags_and_relabels() {
        let store = store_with(vec![blackout("b1", "http(.*)")]).await;
        let config = BlackoutConfig {
            notification_blackout: true,
        };
        let plugin = BlackoutRegexPlugin::new(config, store);

        let out = plugin.pre_receive(alert()).await.unwrap().into_alert().unwrap();
        assert_eq!(out.status, "blackout");
        assert!(out.tags.contains(&"regex_blackout=b1".to_string()));
    }

    #[tokio::test]
    async fn test_recheck_active_blackout_keeps_tag_and_status() {
        let store = store_with(vec![blackout("b1", "http(.*)")]).await;
        let config = BlackoutConfig {
            notification_blackout: true,
        };
        let plugin = BlackoutRegexPlugin::new(config, store);

        let mut tagged = alert();
        tagged.add_tag("regex_blackout=b1");

        let out = plugin.pre_receive(tagged).await.unwrap().into_alert().unwrap();
        assert_eq!(out.status, "blackout");
        assert!(out.tags.contains(&"regex_blackout=b1".to_string()));
    }

    #[tokio::test]
    async fn test_recheck_inactive_blackout_removes_tag_leaves_status() {
        let store = store_with(vec![blackout("b1", "http(.*)")]).await;
        store.set_status("b1", BlackoutStatus::Expired).await;
        let config = BlackoutConfig {
            notification_blackout: true,
        };
        let plugin = BlackoutRegexPlugin::new(config, store);

        let mut tagged = alert();
        tagged.add_tag("regex_blackout=b1");

        let out = plugin.pre_receive(tagged).await.unwrap().into_alert().unwrap();
        assert_eq!(out.status, "open");
        assert!(out.tags.iter().all(|t| !t.starts_with(BLACKOUT_TAG_PREFIX)));
    }

    #[tokio::test]
    async fn test_recheck_deleted_blackout_removes_tag() {
        let store = store_with(vec![]).await;
        let plugin = BlackoutRegexPlugin::new(BlackoutConfig::default(), store);

        let mut tagged = alert();
        tagged.add_tag("regex_blackout=gone");

        let out = plugin.pre_receive(tagged).await.unwrap().into_alert().unwrap();
        assert!(out.tags.iter().all(|t| !t.starts_with(BLACKOUT_TAG_PREFIX)));
    }

    #[tokio::test]
    async fn test_terminal_status_is_ignored() {
        let store = store_with(vec![blackout("b1", "http(.*)")]).await;
        let plugin = BlackoutRegexPlugin::new(BlackoutConfig::default(), store);

        for status in ["closed", "expired", "shelved"] {
            let mut a = alert();
            a.status = status.to_string();
            let out = plugin.pre_receive(a).await.unwrap().into_alert().unwrap();
            assert_eq!(out.status, status);
        }
    }

    #[tokio::test]
    async fn test_invalid_blackout_pattern_is_skipped() {
        let store = store_with(vec![
            blackout("bad", "[invalid("),
            blackout("good", "http(.*)"),
        ])
        .await;
        let plugin = BlackoutRegexPlugin::new(BlackoutConfig::default(), store);

        // The malformed rule is skipped; the next one still matches.
        let decision = plugin.pre_receive(alert()).await.unwrap();
        assert!(decision.is_suppressed());
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_pass_through() {
        struct FailingStore;

        #[async_trait]
        impl BlackoutStore for FailingStore {
            async fn count(&self) -> Result<usize, StoreError> {
                Err(StoreError::Unavailable("down".to_string()))
            }
            async fn find_all(&self) -> Result<Vec<Blackout>, StoreError> {
                Err(StoreError::Unavailable("down".to_string()))
            }
        }

        let plugin = BlackoutRegexPlugin::new(BlackoutConfig::default(), Arc::new(FailingStore));
        let out = plugin.pre_receive(alert()).await.unwrap().into_alert().unwrap();
        assert_eq!(out.status, "open");
    }

    #[tokio::test]
    async fn test_first_matching_blackout_wins() {
        let store = store_with(vec![blackout("b1", "http(.*)"), blackout("b2", "http5")]).await;
        let config = BlackoutConfig {
            notification_blackout: true,
        };
        let plugin = BlackoutRegexPlugin::new(config, store);

        let out = plugin.pre_receive(alert()).await.unwrap().into_alert().unwrap();
        assert!(out.tags.contains(&"regex_blackout=b1".to_string()));
        assert!(!out.tags.contains(&"regex_blackout=b2".to_string()));
    }
}
