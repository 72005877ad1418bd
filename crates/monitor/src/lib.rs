//! Drowsiness Monitoring
//!
//! Converts the detector frame stream into alert events using rising-edge
//! detection with repeat suppression: exactly one alert per false→true
//! transition of the drowsiness flag, none while the condition persists.
//! Duration/threshold evaluation has already happened upstream in the
//! detector.

mod stats;

pub use stats::SessionStats;

use std::sync::Arc;
use storage::alerts::{AlertLog, NewAlert, Severity};
use storage::settings::SettingsStore;
use stream_client::MeasurementFrame;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Alert type recorded for drowsiness-onset events.
pub const DROWSINESS_ALERT_TYPE: &str = "Drowsiness";

/// Fixed alert message for sustained eye closure.
pub const DROWSINESS_ALERT_MESSAGE: &str = "Eyes closed beyond the configured closure threshold";

/// Audible alarm seam. Lets tests count invocations without a device.
pub trait Alarm: Send + Sync {
    fn play(&self);
}

impl Alarm for alarm::AlarmSequencer {
    fn play(&self) {
        alarm::AlarmSequencer::play(self)
    }
}

/// Best-effort user-facing notification channel (system notifications on
/// hosts that grant permission). Must never block alert recording.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Default notifier: surfaces the alert in the log stream only.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        warn!("{}: {}", title, body);
    }
}

/// Live per-frame status for display collaborators. `ear` and
/// `face_detected` are forwarded unchanged from the detector; they carry no
/// alerting logic.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MonitorStatus {
    pub ear: f64,
    pub face_detected: bool,
    pub drowsy: bool,
}

/// Edge-triggered drowsiness monitor.
///
/// A minimal two-state machine keyed off the incoming drowsiness flag:
/// alert-armed, and alert-fired-and-suppressed until a non-drowsy frame
/// re-arms it.
pub struct DrowsinessMonitor {
    settings: Arc<SettingsStore>,
    log: Arc<AlertLog>,
    alarm: Arc<dyn Alarm>,
    notifier: Arc<dyn Notifier>,
    status_tx: watch::Sender<MonitorStatus>,
    stats: SessionStats,
    was_drowsy: bool,
}

impl DrowsinessMonitor {
    pub fn new(settings: Arc<SettingsStore>, log: Arc<AlertLog>, alarm: Arc<dyn Alarm>) -> Self {
        let (status_tx, _) = watch::channel(MonitorStatus::default());
        Self {
            settings,
            log,
            alarm,
            notifier: Arc::new(LogNotifier),
            status_tx,
            stats: SessionStats::new(),
            was_drowsy: false,
        }
    }

    /// Replace the notification channel.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Subscribe to the live per-frame status.
    pub fn status(&self) -> watch::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    /// Session statistics so far.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Process one frame: fire an alert on the false→true drowsiness edge,
    /// suppress repeats while the condition persists, re-arm on the first
    /// non-drowsy frame.
    pub fn process(&mut self, frame: MeasurementFrame) {
        self.stats.record(frame.ear);

        if frame.is_drowsy && !self.was_drowsy {
            self.was_drowsy = true;
            self.on_drowsiness_onset();
        } else if !frame.is_drowsy {
            self.was_drowsy = false;
        }

        let _ = self.status_tx.send(MonitorStatus {
            ear: frame.ear,
            face_detected: frame.face_detected,
            drowsy: self.was_drowsy,
        });
    }

    fn on_drowsiness_onset(&mut self) {
        let settings = self.settings.current();

        let alert = NewAlert {
            kind: DROWSINESS_ALERT_TYPE.to_string(),
            message: DROWSINESS_ALERT_MESSAGE.to_string(),
            severity: Severity::High,
            duration: Some(format!("{:.1}s", settings.closure_duration)),
        };

        match self.log.append(alert) {
            Ok(record) => info!("Drowsiness alert recorded (id {})", record.id),
            Err(e) => warn!("Failed to record drowsiness alert: {}", e),
        }

        if settings.alert_sound {
            self.alarm.play();
        }

        self.notifier.notify(
            "Drowsiness detected",
            "Please take a break or pull over safely.",
        );
    }

    /// Consume the frame stream until the client tears it down (channel
    /// close), then return the session statistics.
    pub async fn run(
        mut self,
        mut frames: mpsc::UnboundedReceiver<MeasurementFrame>,
    ) -> SessionStats {
        info!("Drowsiness monitor started");
        while let Some(frame) = frames.recv().await {
            self.process(frame);
        }
        info!("Frame stream ended after {} frames", self.stats.frames());
        self.stats
    }
}
