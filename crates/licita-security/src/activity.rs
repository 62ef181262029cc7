//! Append-only access log kept in the local store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use licita_common::store::keys;
use licita_common::{JsonStoreExt, KeyValueStore};

pub const PAGE_ACCESS: &str = "page access";
pub const LOGIN: &str = "login";
pub const LOGOUT: &str = "logout";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub user_id: String,
    pub action: String,
    #[serde(default)]
    pub page: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(
        user_id: impl Into<String>,
        action: impl Into<String>,
        page: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            action: action.into(),
            page: page.into(),
            timestamp,
        }
    }
}

/// Size-capped log; the oldest entries are evicted first
#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<dyn KeyValueStore>,
    max_entries: usize,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn KeyValueStore>, max_entries: usize) -> Self {
        Self { store, max_entries }
    }

    pub fn append(&self, entry: ActivityEntry) -> licita_common::Result<()> {
        let mut entries = self.entries();
        entries.push(entry);
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(0..excess);
        }
        self.store.set_json(keys::ACTIVITY_LOG, &entries)
    }

    /// Current entries, oldest first. An unreadable log reads as empty.
    pub fn entries(&self) -> Vec<ActivityEntry> {
        match self.store.get_json::<Vec<ActivityEntry>>(keys::ACTIVITY_LOG) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(e) => {
                warn!("Discarding unreadable activity log: {}", e);
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> licita_common::Result<()> {
        self.store.remove(keys::ACTIVITY_LOG)
    }
}
