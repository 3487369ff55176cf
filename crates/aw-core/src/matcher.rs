//! Regex attribute matching between rules and alerts.
//!
//! A rule carries per-attribute regex patterns; it matches an alert when
//! every configured pattern finds a match in the corresponding alert
//! attribute (regex *search*, not an anchored full match) and at least one
//! attribute participated in the decision. A rule with no attributes
//! configured never matches.

use crate::alert::{parse_tags, Alert};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during rule evaluation.
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// What to do when a rule has service patterns but the alert carries no
/// service list. Observed source variants disagree; the policy makes the
/// choice explicit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServicePolicy {
    /// Skip the service check entirely (the blackout variant's behavior).
    #[default]
    SkipWhenAlertEmpty,
    /// Fail the rule, mirroring the scalar attributes.
    RequireAlertService,
}

/// Direction of the tag-key subset requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKeyPolicy {
    /// Every rule tag key must exist on the alert.
    #[default]
    RuleSubsetOfAlert,
    /// Every alert tag key must exist on the rule.
    AlertSubsetOfRule,
}

/// Tunable evaluation points where source variants diverge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPolicy {
    /// Handling of a missing alert service list.
    #[serde(default)]
    pub service: ServicePolicy,
    /// Direction of the tag-key subset check.
    #[serde(default)]
    pub tag_keys: TagKeyPolicy,
}

/// Per-attribute regex patterns evaluated against an alert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Environment pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Group pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Event pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Resource pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Positional patterns, matched index-by-index against the alert's
    /// service list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<String>,
    /// `"key=pattern"` entries matched against the alert's tag map.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Rule {
    /// Whether the rule has no patterns configured at all.
    pub fn is_empty(&self) -> bool {
        self.environment.is_none()
            && self.group.is_none()
            && self.event.is_none()
            && self.resource.is_none()
            && self.service.is_empty()
            && self.tags.is_empty()
    }

    /// Compiles every pattern in the rule once, surfacing the first bad one.
    pub fn validate(&self) -> Result<(), MatchError> {
        let scalars = [&self.environment, &self.group, &self.event, &self.resource];
        for pattern in scalars.into_iter().flatten() {
            compile(pattern)?;
        }
        for pattern in &self.service {
            compile(pattern)?;
        }
        for (_, pattern) in parse_tags(&self.tags) {
            compile(&pattern)?;
        }
        Ok(())
    }

    /// Evaluates this rule against an alert.
    ///
    /// Inputs are borrowed immutably: evaluating twice with the same inputs
    /// yields the same verdict.
    pub fn matches(&self, alert: &Alert, policy: MatchPolicy) -> Result<bool, MatchError> {
        let mut matched = false;

        // Scalar attributes in fixed order; the first failure decides.
        let scalars = [
            ("environment", self.environment.as_deref(), alert.environment.as_str()),
            ("group", self.group.as_deref(), alert.group.as_str()),
            ("event", self.event.as_deref(), alert.event.as_str()),
            ("resource", self.resource.as_deref(), alert.resource.as_str()),
        ];
        for (attribute, pattern, value) in scalars {
            let Some(pattern) = pattern else { continue };
            if value.is_empty() {
                debug!(attribute, pattern, "alert attribute empty, rule cannot match");
                return Ok(false);
            }
            if !search(pattern, value)? {
                debug!(attribute, pattern, value, "attribute does not match");
                return Ok(false);
            }
            matched = true;
        }

        // Service patterns are positional: same length, each index must
        // search-match.
        if !self.service.is_empty() {
            if alert.service.is_empty() {
                if policy.service == ServicePolicy::RequireAlertService {
                    debug!("alert has no service list, rule requires one");
                    return Ok(false);
                }
                // SkipWhenAlertEmpty: the check neither fails nor counts.
            } else {
                if self.service.len() != alert.service.len() {
                    debug!(
                        rule_len = self.service.len(),
                        alert_len = alert.service.len(),
                        "service list length mismatch"
                    );
                    return Ok(false);
                }
                for (pattern, value) in self.service.iter().zip(&alert.service) {
                    if !search(pattern, value)? {
                        debug!(pattern, value, "service entry does not match");
                        return Ok(false);
                    }
                }
                matched = true;
            }
        }

        // Tag patterns: key subset plus a per-key value search. Only a rule
        // that actually carries tag patterns participates in the match, so
        // an attribute-less rule can never match an alert by tags alone.
        if !self.tags.is_empty() || !alert.tags.is_empty() {
            let rule_tags = parse_tags(&self.tags);
            let alert_tags = parse_tags(&alert.tags);

            let subset_holds = match policy.tag_keys {
                TagKeyPolicy::RuleSubsetOfAlert => {
                    rule_tags.keys().all(|k| alert_tags.contains_key(k))
                }
                TagKeyPolicy::AlertSubsetOfRule => {
                    alert_tags.keys().all(|k| rule_tags.contains_key(k))
                }
            };
            if !subset_holds {
                debug!(?rule_tags, ?alert_tags, "tag keys do not satisfy subset requirement");
                return Ok(false);
            }

            for (key, pattern) in &rule_tags {
                let Some(value) = alert_tags.get(key) else { continue };
                if !search(pattern, value)? {
                    debug!(key, pattern, value, "tag value does not match");
                    return Ok(false);
                }
            }

            if !rule_tags.is_empty() {
                matched = true;
            }
        }

        Ok(matched)
    }
}

fn compile(pattern: &str) -> Result<Regex, MatchError> {
    Regex::new(pattern).map_err(|source| MatchError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Unanchored regex search, the match primitive for every attribute.
fn search(pattern: &str, value: &str) -> Result<bool, MatchError> {
    Ok(compile(pattern)?.is_match(value))
}
