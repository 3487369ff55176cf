//! Issue tracker connectors.

pub mod jira;
pub mod mock;

pub use jira::{escape_jql_value, JiraConfig, JiraConnector};
pub use mock::MockTicketingConnector;
