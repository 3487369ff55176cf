//! Blackout records and the host-provided blackout store.
//!
//! Blackouts are time-scoped suppression rules persisted by the host; the
//! plugin only reads them. The store trait abstracts over the host's
//! database so the plugin can be tested against an in-memory
//! implementation.

use crate::matcher::Rule;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Lifecycle state of a blackout window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlackoutStatus {
    /// The blackout window is currently open.
    Active,
    /// The window has not started yet.
    Pending,
    /// The window has closed.
    Expired,
}

/// A blackout record with regex pattern attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blackout {
    /// Blackout identifier assigned by the host.
    pub id: String,
    /// Current window state.
    pub status: BlackoutStatus,
    /// Environment pattern.
    #[serde(default)]
    pub environment: Option<String>,
    /// Group pattern.
    #[serde(default)]
    pub group: Option<String>,
    /// Event pattern.
    #[serde(default)]
    pub event: Option<String>,
    /// Resource pattern.
    #[serde(default)]
    pub resource: Option<String>,
    /// Positional service patterns.
    #[serde(default)]
    pub service: Vec<String>,
    /// Tag patterns as `"key=pattern"` strings.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Blackout {
    /// Whether the blackout window is currently open.
    pub fn is_active(&self) -> bool {
        self.status == BlackoutStatus::Active
    }

    /// The match rule encoded by this blackout's pattern attributes.
    pub fn rule(&self) -> Rule {
        Rule {
            environment: self.environment.clone(),
            group: self.group.clone(),
            event: self.event.clone(),
            resource: self.resource.clone(),
            service: self.service.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Errors raised by a blackout store implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("blackout store unavailable: {0}")]
    Unavailable(String),

    #[error("blackout store query failed: {0}")]
    QueryFailed(String),
}

/// Host-provided persistence for blackout records.
#[async_trait]
pub trait BlackoutStore: Send + Sync {
    /// Number of blackouts currently known to the store.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Fetches every blackout record.
    async fn find_all(&self) -> Result<Vec<Blackout>, StoreError>;
}

/// In-memory blackout store backing tests.
#[derive(Default)]
pub struct MemoryBlackoutStore {
    blackouts: RwLock<Vec<Blackout>>,
}

impl MemoryBlackoutStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a blackout record.
    pub async fn insert(&self, blackout: Blackout) {
        self.blackouts.write().await.push(blackout);
    }

    /// Updates the status of the blackout with the given id, if present.
    pub async fn set_status(&self, id: &str, status: BlackoutStatus) {
        let mut blackouts = self.blackouts.write().await;
        if let Some(blackout) = blackouts.iter_mut().find(|b| b.id == id) {
            blackout.status = status;
        }
    }

    /// Removes the blackout with the given id, if present.
    pub async fn remove(&self, id: &str) {
        self.blackouts.write().await.retain(|b| b.id != id);
    }
}

#[async_trait]
impl BlackoutStore for MemoryBlackoutStore {
    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.blackouts.read().await.len())
    }

    async fn find_all(&self) -> Result<Vec<Blackout>, StoreError> {
        Ok(self.blackouts.read().await.clone())
    }
}
