//! # aw-plugins
//!
//! Alert lifecycle plugins for the alert-warden host.
//!
//! Two plugins live here: the blackout-regex plugin, which suppresses or
//! relabels alerts falling inside regex-defined blackout windows, and the
//! Jira plugin, which turns matching alerts into tickets and keeps the
//! ticket association on the alert in sync.

pub mod blackout;
pub mod config;
pub mod jira;

pub use blackout::{BlackoutRegexPlugin, BLACKOUT_TAG_PREFIX};
pub use config::{BlackoutConfig, ConfigError, JiraPluginConfig, TriggerAssignee, TriggerRule};
pub use jira::JiraPlugin;
