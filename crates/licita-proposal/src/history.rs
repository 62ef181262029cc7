//! Local record of successfully submitted proposals.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use licita_common::store::keys;
use licita_common::{normalize_tax_id, JsonStoreExt, KeyValueStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "protocolo", alias = "protocol")]
    pub protocol: String,
    #[serde(rename = "data", alias = "submitted_at")]
    pub submitted_at: DateTime<Utc>,
    #[serde(rename = "empresa", alias = "company", default)]
    pub company: String,
    #[serde(rename = "cnpj", alias = "tax_id", default)]
    pub tax_id: String,
    #[serde(rename = "valor", alias = "total", default)]
    pub total: String,
    #[serde(rename = "processo", alias = "process", default)]
    pub process: String,
}

pub struct SubmissionHistory {
    store: Arc<dyn KeyValueStore>,
}

impl SubmissionHistory {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn record(&self, entry: HistoryEntry) -> licita_common::Result<()> {
        let mut entries = self.entries();
        entries.push(entry);
        self.store.set_json(keys::SUBMISSIONS, &entries)
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        match self.store.get_json::<Vec<HistoryEntry>>(keys::SUBMISSIONS) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(e) => {
                warn!("Ignoring unreadable submission history: {}", e);
                Vec::new()
            }
        }
    }

    /// Earlier submission for the same tax id (digits only) and process
    pub fn find_duplicate(&self, tax_id: &str, process: &str) -> Option<HistoryEntry> {
        let wanted = normalize_tax_id(tax_id);
        self.entries()
            .into_iter()
            .find(|e| normalize_tax_id(&e.tax_id) == wanted && e.process == process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use licita_common::MemoryStore;

    fn entry(protocol: &str, tax_id: &str, process: &str) -> HistoryEntry {
        HistoryEntry {
            protocol: protocol.to_string(),
            submitted_at: Utc::now(),
            company: "ACME".to_string(),
            tax_id: tax_id.to_string(),
            total: "2.100,00".to_string(),
            process: process.to_string(),
        }
    }

    #[test]
    fn test_find_duplicate_matches_digits_and_process() {
        let history = SubmissionHistory::new(Arc::new(MemoryStore::new()));
        history
            .record(entry("PROP-A", "12.345.678/0001-90", "CC-1"))
            .unwrap();
        history.record(entry("PROP-B", "98765432000100", "CC-2")).unwrap();

        let found = history.find_duplicate("12345678000190", "CC-1").unwrap();
        assert_eq!(found.protocol, "PROP-A");
        assert!(history.find_duplicate("12345678000190", "CC-2").is_none());
        assert_eq!(history.entries().len(), 2);
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(entry("PROP-A", "1", "CC-1")).unwrap();
        assert_eq!(json["protocolo"], "PROP-A");
        assert_eq!(json["valor"], "2.100,00");
    }
}
