//! # aw-connectors
//!
//! Issue tracker integration for alert-warden.
//!
//! This crate provides the trait definitions and implementations for
//! talking to an external ticketing system, plus the HTTP plumbing and
//! credential handling they share.

pub mod http;
pub mod secure_string;
pub mod ticketing;
pub mod traits;

pub use secure_string::SecureString;
pub use ticketing::{escape_jql_value, JiraConfig, JiraConnector, MockTicketingConnector};
pub use traits::{
    AuthConfig, Connector, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult,
    CreateIssueRequest, Issue, TicketingConnector, Transition,
};
