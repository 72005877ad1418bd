//! Storage Layer
//!
//! Durable local persistence behind a key-value interface, plus the two
//! stores built on top of it: the bounded alert history and the detection
//! settings singleton.

pub mod alerts;
pub mod kv;
pub mod settings;

pub use alerts::{AlertLog, AlertRecord, NewAlert, Severity, MAX_ALERTS};
pub use kv::{FileStore, KvStore, MemoryStore};
pub use settings::{Settings, SettingsStore};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}
