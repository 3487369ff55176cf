//! Alert data model.
//!
//! Plugins receive an alert from the host's processing pipeline, may adjust
//! its tags, status, and attributes, and hand it back for the host to
//! persist. Only the attributes the plugins actually read or write are
//! modeled here; the host owns the full record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An alert as delivered by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Alert identifier (assigned by the host after correlation).
    pub id: String,
    /// Resource under alarm, e.g. `"web01:nginx"`.
    pub resource: String,
    /// Event name, e.g. `"node_down"` or `"http500"`.
    pub event: String,
    /// Environment, e.g. `"Production"`.
    pub environment: String,
    /// Severity label, e.g. `"critical"`.
    pub severity: String,
    /// Current status, e.g. `"open"`, `"ack"`, `"blackout"`.
    pub status: String,
    /// Event group.
    #[serde(default)]
    pub group: String,
    /// Event value, e.g. `"5ms"`.
    #[serde(default)]
    pub value: String,
    /// Free-form alert text.
    #[serde(default)]
    pub text: String,
    /// Monitoring source that raised the alert.
    #[serde(default)]
    pub origin: String,
    /// Affected services, ordered.
    #[serde(default)]
    pub service: Vec<String>,
    /// Tags as raw `"key=value"` strings, unparsed.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Attribute bag persisted by the host alongside the alert.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
    /// How many times this alert has been received before.
    #[serde(default)]
    pub duplicate_count: u64,
}

impl Alert {
    /// Appends a tag unless an identical one is already present.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// Removes every tag starting with the given prefix.
    pub fn remove_tags_by_prefix(&mut self, prefix: &str) {
        self.tags.retain(|t| !t.starts_with(prefix));
    }

    /// The parsed key/value view of this alert's tags.
    pub fn tag_map(&self) -> HashMap<String, String> {
        parse_tags(&self.tags)
    }
}

/// Builds a key/value map from a list of `"key=value"` strings.
///
/// Each entry is split on the first `=`; entries without one are dropped.
/// When a key repeats, the last occurrence wins. The map is ephemeral and
/// rebuilt on every evaluation, never persisted.
pub fn parse_tags<S: AsRef<str>>(tags: &[S]) -> HashMap<String, String> {
    tags.iter()
        .filter_map(|tag| tag.as_ref().split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags_drops_entries_without_separator() {
        let map = parse_tags(&["env=prod", "orphan", "team=sre"]);
        assert_eq!(map.len(), 2);
        assert_eq!(map["env"], "prod");
        assert_eq!(map["team"], "sre");
    }

    #[test]
    fn test_parse_tags_splits_on_first_separator_only() {
        let map = parse_tags(&["query=a=b=c"]);
        assert_eq!(map["query"], "a=b=c");
    }

    #[test]
    fn test_parse_tags_last_occurrence_wins() {
        let map = parse_tags(&["env=prod", "env=staging"]);
        assert_eq!(map["env"], "staging");
    }

    #[test]
    fn test_parse_tags_empty_value() {
        let map = parse_tags(&["flag="]);
        assert_eq!(map["flag"], "");
    }

    #[test]
    fn test_add_tag_deduplicates() {
        let mut alert = Alert::default();
        alert.add_tag("env=prod");
        alert.add_tag("env=prod");
        assert_eq!(alert.tags, vec!["env=prod"]);
    }

    #[test]
    fn test_remove_tags_by_prefix() {
        let mut alert = Alert {
            tags: vec![
                "regex_blackout=b1".to_string(),
                "env=prod".to_string(),
                "regex_blackout=b2".to_string(),
            ],
            ..Default::default()
        };
        alert.remove_tags_by_prefix("regex_blackout=");
        assert_eq!(alert.tags, vec!["env=prod"]);
    }
}
