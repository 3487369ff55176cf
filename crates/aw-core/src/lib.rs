//! # aw-core
//!
//! Data model and matching core for alert-warden plugins.
//!
//! This crate provides the alert and blackout records, the regex attribute
//! match filter shared by the blackout and ticketing plugins, and the
//! lifecycle contract the host invokes around alert processing.

pub mod alert;
pub mod blackout;
pub mod matcher;
pub mod plugin;

pub use alert::{parse_tags, Alert};
pub use blackout::{Blackout, BlackoutStatus, BlackoutStore, MemoryBlackoutStore, StoreError};
pub use matcher::{MatchError, MatchPolicy, Rule, ServicePolicy, TagKeyPolicy};
pub use plugin::{FilterDecision, Plugin, PluginError, PluginResult};
