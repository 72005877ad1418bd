//! Bounded, persisted alert history

use crate::kv::KvStore;
use crate::StorageError;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Storage key for the persisted alert history
const ALERTS_KEY: &str = "alerts";

/// Maximum retained alerts; oldest entries are evicted silently.
pub const MAX_ALERTS: usize = 50;

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// A recorded alert. The log keeps these newest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Creation time in milliseconds, bumped to stay strictly increasing
    pub id: i64,
    /// Creation time, ISO-8601
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// Alert fields supplied by the caller; `id` and `timestamp` are assigned
/// on append.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub kind: String,
    pub message: String,
    pub severity: Severity,
    pub duration: Option<String>,
}

/// Bounded, persisted history of alerts, newest first.
///
/// Persistence failures degrade the log to in-memory-only operation for the
/// rest of the session; appends and clears keep working.
pub struct AlertLog {
    store: Arc<dyn KvStore>,
    entries: Mutex<Vec<AlertRecord>>,
    degraded: AtomicBool,
}

impl AlertLog {
    /// Hydrate from durable storage. A missing or corrupt entry yields an
    /// empty log.
    pub fn load(store: Arc<dyn KvStore>) -> Self {
        let entries = match store.get(ALERTS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<AlertRecord>>(&raw) {
                Ok(mut list) => {
                    list.truncate(MAX_ALERTS);
                    list
                }
                Err(e) => {
                    warn!("Discarding corrupt alert history: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read alert history: {}", e);
                Vec::new()
            }
        };

        if !entries.is_empty() {
            info!("Loaded {} stored alerts", entries.len());
        }

        Self {
            store,
            entries: Mutex::new(entries),
            degraded: AtomicBool::new(false),
        }
    }

    /// Finalize and record an alert: assign id and timestamp, prepend,
    /// truncate to the most recent [`MAX_ALERTS`], persist, and return the
    /// stored record.
    pub fn append(&self, alert: NewAlert) -> Result<AlertRecord, StorageError> {
        let now = Utc::now();
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        // Ids come from the creation timestamp; bump past the newest entry
        // when two alerts land in the same millisecond
        let mut id = now.timestamp_millis();
        if let Some(newest) = entries.first() {
            if id <= newest.id {
                id = newest.id + 1;
            }
        }

        let record = AlertRecord {
            id,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            kind: alert.kind,
            message: alert.message,
            severity: alert.severity,
            duration: alert.duration,
        };

        entries.insert(0, record.clone());
        entries.truncate(MAX_ALERTS);
        self.persist(&entries);

        Ok(record)
    }

    /// Empty the log and remove the persisted entry entirely (not an empty
    /// array).
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        entries.clear();

        if !self.degraded.load(Ordering::Relaxed) {
            if let Err(e) = self.store.remove(ALERTS_KEY) {
                warn!("Failed to remove persisted alerts, continuing in-memory: {}", e);
                self.degraded.store(true, Ordering::Relaxed);
            }
        }

        info!("Alert history cleared");
        Ok(())
    }

    /// Snapshot of the current history, newest first.
    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Number of recorded alerts.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, entries: &[AlertRecord]) {
        if self.degraded.load(Ordering::Relaxed) {
            return;
        }

        let payload = match serde_json::to_string(entries) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to serialize alert history: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(ALERTS_KEY, &payload) {
            warn!("Alert persistence failed, continuing in-memory only: {}", e);
            self.degraded.store(true, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use proptest::prelude::*;

    fn drowsiness_alert() -> NewAlert {
        NewAlert {
            kind: "Drowsiness".to_string(),
            message: "Sustained eye closure".to_string(),
            severity: Severity::High,
            duration: Some("3.0s".to_string()),
        }
    }

    /// Store whose writes always fail, for degraded-mode tests.
    struct FailingStore;

    impl KvStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io("quota exceeded".to_string()))
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Io("quota exceeded".to_string()))
        }
    }

    #[test]
    fn test_append_assigns_id_and_timestamp() {
        let log = AlertLog::load(Arc::new(MemoryStore::new()));
        let record = log.append(drowsiness_alert()).unwrap();

        assert!(record.id > 0);
        assert!(record.timestamp.ends_with('Z'));
        assert_eq!(record.kind, "Drowsiness");
        assert_eq!(record.severity, Severity::High);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_newest_first_ordering() {
        let log = AlertLog::load(Arc::new(MemoryStore::new()));
        let first = log.append(drowsiness_alert()).unwrap();
        let second = log.append(drowsiness_alert()).unwrap();

        let alerts = log.alerts();
        assert_eq!(alerts[0].id, second.id);
        assert_eq!(alerts[1].id, first.id);
    }

    #[test]
    fn test_ids_strictly_increase_within_one_millisecond() {
        let log = AlertLog::load(Arc::new(MemoryStore::new()));

        // Fast consecutive appends frequently share a millisecond
        let ids: Vec<i64> = (0..20)
            .map(|_| log.append(drowsiness_alert()).unwrap().id)
            .collect();

        for pair in ids.windows(2) {
            assert!(pair[1] > pair[0], "ids must strictly increase: {:?}", pair);
        }
    }

    #[test]
    fn test_truncation_at_capacity() {
        let log = AlertLog::load(Arc::new(MemoryStore::new()));
        let mut last_id = 0;
        for _ in 0..(MAX_ALERTS + 10) {
            last_id = log.append(drowsiness_alert()).unwrap().id;
        }

        assert_eq!(log.len(), MAX_ALERTS);
        // Newest entry survives eviction
        assert_eq!(log.alerts()[0].id, last_id);
    }

    #[test]
    fn test_persisted_roundtrip() {
        let store = Arc::new(MemoryStore::new());
        let log = AlertLog::load(store.clone());
        log.append(drowsiness_alert()).unwrap();
        log.append(drowsiness_alert()).unwrap();

        let reloaded = AlertLog::load(store);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.alerts()[0].kind, "Drowsiness");
    }

    #[test]
    fn test_clear_removes_persisted_entry() {
        let store = Arc::new(MemoryStore::new());
        let log = AlertLog::load(store.clone());
        log.append(drowsiness_alert()).unwrap();
        assert!(store.get("alerts").unwrap().is_some());

        log.clear().unwrap();
        assert!(log.is_empty());
        // The key is gone, not persisted as an empty array
        assert_eq!(store.get("alerts").unwrap(), None);
    }

    #[test]
    fn test_corrupt_history_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set("alerts", "not json at all").unwrap();

        let log = AlertLog::load(store);
        assert!(log.is_empty());
    }

    #[test]
    fn test_write_failure_degrades_to_memory() {
        let log = AlertLog::load(Arc::new(FailingStore));

        let record = log.append(drowsiness_alert()).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.alerts()[0].id, record.id);

        // Still operational after the failed persist
        log.append(drowsiness_alert()).unwrap();
        assert_eq!(log.len(), 2);
        log.clear().unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn test_duration_absent_is_omitted_from_json() {
        let log = AlertLog::load(Arc::new(MemoryStore::new()));
        let record = log
            .append(NewAlert {
                duration: None,
                ..drowsiness_alert()
            })
            .unwrap();

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("duration"));
        assert!(json.contains(r#""type":"Drowsiness""#));
        assert!(json.contains(r#""severity":"high""#));
    }

    proptest! {
        #[test]
        fn prop_log_never_exceeds_capacity(appends in 0usize..200) {
            let log = AlertLog::load(Arc::new(MemoryStore::new()));
            for _ in 0..appends {
                log.append(drowsiness_alert()).unwrap();
            }
            prop_assert!(log.len() <= MAX_ALERTS);
            prop_assert_eq!(log.len(), appends.min(MAX_ALERTS));
        }
    }
}
