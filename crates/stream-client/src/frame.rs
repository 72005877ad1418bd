//! Measurement frame decoding

use serde::Deserialize;
use thiserror::Error;

/// One per-frame measurement from the detector.
///
/// Produced once per sampling tick, consumed immediately, never persisted.
/// Duration/threshold evaluation has already happened upstream; `is_drowsy`
/// is the detector's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MeasurementFrame {
    /// Eye aspect ratio; lower values mean more closed eyes
    pub ear: f64,
    /// Whether a face was found in this frame
    pub face_detected: bool,
    /// Whether eye closure has exceeded the configured duration
    pub is_drowsy: bool,
}

/// Frame decode failure. Always a per-message error: the caller drops the
/// message and keeps the connection alive.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ear value {0} is not a finite non-negative number")]
    InvalidEar(f64),
}

impl MeasurementFrame {
    /// Parse one detector message into a validated frame.
    pub fn decode(payload: &str) -> Result<Self, DecodeError> {
        let frame: MeasurementFrame = serde_json::from_str(payload)?;
        if !frame.ear.is_finite() || frame.ear < 0.0 {
            return Err(DecodeError::InvalidEar(frame.ear));
        }
        Ok(frame)
    }
}
