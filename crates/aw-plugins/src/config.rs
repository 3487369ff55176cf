//! Plugin configuration loading.
//!
//! Configuration arrives as a JSON mapping, from the host's config, an
//! environment variable, or a file on disk. `${VAR}` placeholders are
//! substituted from the environment before parsing so credentials can stay
//! out of the file. Missing required properties are fatal at construction
//! time, and every trigger pattern is compiled once up front.

use aw_connectors::SecureString;
use aw_core::matcher::{MatchError, Rule};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("missing required property [{0}] in config")]
    MissingField(&'static str),

    #[error("invalid trigger pattern: {0}")]
    InvalidPattern(#[from] MatchError),

    #[error("failed to initialize connector: {0}")]
    Connector(String),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),
}

/// Ticket routing applied when a trigger matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerAssignee {
    /// Project key the ticket is filed under.
    pub project: String,
    /// Issue type name.
    #[serde(rename = "issue-type")]
    pub issue_type: String,
    /// Optional user the ticket is assigned to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// A trigger: when `matches` fires against an alert, a ticket is created
/// and routed per `assignee`. Triggers are evaluated in declaration order;
/// the first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRule {
    /// Attribute patterns the alert must satisfy.
    pub matches: Rule,
    /// Where the resulting ticket goes.
    pub assignee: TriggerAssignee,
}

fn default_finished_transition() -> String {
    "Done".to_string()
}

/// Configuration for the Jira plugin.
///
/// Property names follow the host's config contract, including the spaced
/// keys `"api token"` and `"finished transition"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraPluginConfig {
    /// Jira base URL.
    #[serde(default)]
    pub url: String,
    /// Jira account user.
    #[serde(default)]
    pub user: String,
    /// Jira API token.
    #[serde(rename = "api token", default)]
    pub api_token: SecureString,
    /// Name of the workflow transition that closes a ticket.
    #[serde(rename = "finished transition", default = "default_finished_transition")]
    pub finished_transition: String,
    /// Ordered trigger list.
    #[serde(default)]
    pub triggers: Vec<TriggerRule>,
}

impl JiraPluginConfig {
    /// Parses a JSON configuration string after `${VAR}` substitution.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let substituted = substitute_env_vars(raw)?;
        let config: Self = serde_json::from_str(&substituted)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Loads the configuration from a JSON-valued environment variable.
    pub fn from_env(var: &str) -> Result<Self, ConfigError> {
        let raw = env::var(var).map_err(|_| ConfigError::EnvVarNotFound(var.to_string()))?;
        Self::from_json_str(&raw)
    }

    /// Validates required properties and every trigger pattern.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::MissingField("url"));
        }
        if self.user.is_empty() {
            return Err(ConfigError::MissingField("user"));
        }
        if self.api_token.is_empty() {
            return Err(ConfigError::MissingField("api token"));
        }
        if self.finished_transition.is_empty() {
            return Err(ConfigError::MissingField("finished transition"));
        }
        for trigger in &self.triggers {
            trigger.matches.validate()?;
        }
        Ok(())
    }
}

/// Configuration for the blackout-regex plugin.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BlackoutConfig {
    /// When true, matched alerts are tagged and relabeled (status
    /// "blackout") instead of being suppressed outright.
    #[serde(default)]
    pub notification_blackout: bool,
}

impl BlackoutConfig {
    /// Reads `NOTIFICATION_BLACKOUT` from the environment.
    pub fn from_env() -> Self {
        let notification_blackout = env::var("NOTIFICATION_BLACKOUT")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        Self {
            notification_blackout,
        }
    }
}

/// Replaces `${VAR_NAME}` placeholders with environment variable values.
fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid");
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in re.captures_iter(input) {
        let full_match = &cap[0];
        let var_name = &cap[1];
        match env::var(var_name) {
            Ok(value) => result = result.replace(full_match, &value),
            Err(_) => missing.push(var_name.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(ConfigError::EnvVarNotFound(missing.join(", ")));
    }

    Ok(result)
}
