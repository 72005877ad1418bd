//! Detection settings store

use crate::kv::KvStore;
use crate::StorageError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Storage key for the persisted settings
const SETTINGS_KEY: &str = "settings";

/// User-tunable detection parameters.
///
/// Ranges are enforced by the settings UI; the store persists whatever the
/// caller provides. Persisted field names keep the camelCase schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// EAR below this value counts as closed eyes (0.15-0.35)
    pub ear_threshold: f64,
    /// Seconds of sustained closure before the detector flags drowsiness (1-10)
    pub closure_duration: f64,
    /// Play the audible alarm pattern on alert
    pub alert_sound: bool,
    /// Overall face/eye tracking sensitivity (0.1-1.0)
    pub sensitivity: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ear_threshold: 0.25,
            closure_duration: 3.0,
            alert_sound: true,
            sensitivity: 0.5,
        }
    }
}

/// Holds and persists the detection settings singleton.
///
/// Callers merge partial edits themselves; `update` replaces the full
/// object and persists it synchronously.
pub struct SettingsStore {
    store: Arc<dyn KvStore>,
    current: Mutex<Settings>,
    degraded: AtomicBool,
}

impl SettingsStore {
    /// Hydrate from durable storage, falling back to the documented
    /// defaults when no (or corrupt) settings are persisted.
    pub fn load(store: Arc<dyn KvStore>) -> Self {
        let current = match store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Settings>(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Discarding corrupt settings, using defaults: {}", e);
                    Settings::default()
                }
            },
            Ok(None) => Settings::default(),
            Err(e) => {
                warn!("Failed to read settings, using defaults: {}", e);
                Settings::default()
            }
        };

        Self {
            store,
            current: Mutex::new(current),
            degraded: AtomicBool::new(false),
        }
    }

    /// Snapshot of the current settings.
    pub fn current(&self) -> Settings {
        self.current
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Replace the full settings object and persist it.
    pub fn update(&self, settings: Settings) -> Result<(), StorageError> {
        let mut current = self
            .current
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        *current = settings.clone();
        drop(current);

        if self.degraded.load(Ordering::Relaxed) {
            return Ok(());
        }

        let payload = serde_json::to_string(&settings)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        if let Err(e) = self.store.set(SETTINGS_KEY, &payload) {
            warn!("Settings persistence failed, continuing in-memory only: {}", e);
            self.degraded.store(true, Ordering::Relaxed);
        } else {
            info!("Settings updated");
        }

        Ok(())
    }
}
