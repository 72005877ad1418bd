//! BlinkSense drowsiness alerting pipeline - main entry point

use app::{init_logging, run, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("=== BlinkSense Core v{} ===", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    run(config).await
}
