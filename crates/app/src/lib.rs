//! BlinkSense Session Wiring
//!
//! Boot configuration, logging setup, and the session lifecycle that
//! connects the detector stream to the monitor and tears everything down
//! on exit.

use alarm::AlarmSequencer;
use monitor::DrowsinessMonitor;
use serde::Deserialize;
use std::sync::Arc;
use storage::{AlertLog, FileStore, KvStore, SettingsStore};
use stream_client::{StreamClient, StreamConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Boot configuration, distinct from the user-tunable detection settings
/// that live in the settings store.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Detector WebSocket endpoint
    pub endpoint: String,
    /// Directory for persisted alerts and settings
    pub data_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8000/ws".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl AppConfig {
    /// Layered load: defaults < optional `blinksense.toml` < `BLINKSENSE_*`
    /// environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = AppConfig::default();
        config::Config::builder()
            .set_default("endpoint", defaults.endpoint)?
            .set_default("data_dir", defaults.data_dir)?
            .add_source(config::File::with_name("blinksense").required(false))
            .add_source(config::Environment::with_prefix("BLINKSENSE"))
            .build()?
            .try_deserialize()
    }
}

/// Initialize logging
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Run a monitoring session until ctrl-c, then release every session
/// resource: pending reconnect timer, open connection, queued alarm beeps.
pub async fn run(app_config: AppConfig) -> anyhow::Result<()> {
    let store: Arc<dyn KvStore> = Arc::new(FileStore::new(&app_config.data_dir)?);
    let settings = Arc::new(SettingsStore::load(store.clone()));
    let log = Arc::new(AlertLog::load(store));
    let alarm = Arc::new(AlarmSequencer::new());

    let monitor = DrowsinessMonitor::new(settings, log.clone(), alarm.clone());

    let (mut client, frames) = StreamClient::connect(StreamConfig::new(&app_config.endpoint));
    let monitor_task = tokio::spawn(monitor.run(frames));

    info!("Session started, watching {}", app_config.endpoint);
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    // Teardown order: close the stream (cancels any pending reconnect),
    // let the monitor drain the closed channel, then silence the alarm.
    client.teardown().await;
    let stats = monitor_task.await?;
    alarm.shutdown();

    info!(
        "Session ended: {} frames over {:?}, avg EAR {:.3}, {} alerts in log",
        stats.frames(),
        stats.session_duration(),
        stats.avg_ear(),
        log.len(),
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.endpoint, "ws://localhost:8000/ws");
        assert_eq!(config.data_dir, "./data");
    }
}
