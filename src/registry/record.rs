// src/registry/record.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One proxied JSON-RPC node as stored in the backend registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRecord {
    pub url: String,
    pub is_leader: bool,
    /// Last successfully observed block height.
    #[serde(default)]
    pub height: Option<u64>,
    #[serde(default)]
    pub is_healthy: bool,
    pub added_at: DateTime<Utc>,
}

impl BackendRecord {
    /// A freshly registered backend: never observed, not healthy.
    pub fn new(url: impl Into<String>, is_leader: bool) -> Self {
        Self {
            url: url.into(),
            is_leader,
            height: None,
            is_healthy: false,
            added_at: Utc::now(),
        }
    }

    /// Copy of this record carrying the outcome of a poll cycle.
    pub fn with_health(&self, height: Option<u64>, is_healthy: bool) -> Self {
        Self {
            height,
            is_healthy,
            ..self.clone()
        }
    }
}
