//! Detector Stream Client
//!
//! Maintains a persistent WebSocket connection to the external drowsiness
//! detector and delivers decoded measurement frames to a single consumer:
//! - Validating per-message frame decode
//! - Automatic fixed-interval reconnect on transport failure
//! - Connection-state notifications for display collaborators

pub mod client;
pub mod frame;

pub use client::{ConnectionState, StreamClient, StreamConfig, RECONNECT_DELAY};
pub use frame::{DecodeError, MeasurementFrame};
