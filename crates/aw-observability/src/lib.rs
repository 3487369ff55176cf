//! # aw-observability
//!
//! Structured logging bootstrap for alert-warden plugins.

pub mod logging;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
