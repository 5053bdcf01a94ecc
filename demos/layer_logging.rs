use std::sync::Arc;
use tracing::{debug, error, info, warn};

use loki_log_sink::init::{init_tracing_with_config, LayerConfig};
use loki_log_sink::loki::{LokiConfig, LokiSink};

/// Installs the Loki layer next to the console `fmt` layer and emits a few
/// events. Configuration comes from `LOKI_*` variables, e.g.
///
/// ```text
/// LOKI_URL=http://localhost:3100 LOKI_TENANT=tenant1 cargo run --example layer_logging
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let loki = LokiConfig::from_env()?
        .with_label("service", "example_service")
        .with_structured_metadata(true);
    let sink = LokiSink::new(loki)?;

    let stats = init_tracing_with_config(Arc::new(sink), LayerConfig::from_env()?)?;

    // Each call returns once its push has completed.
    info!(custom_field = "custom_value", "This is an informational message posted from Rust");
    warn!(custom_field = "custom_value", "This is a warning message posted from Rust");
    error!(custom_field = "custom_value", "This is an error message posted from Rust");
    debug!(custom_field = "custom_value", "This is a debug message posted from Rust");

    println!(
        "Execution complete: {} delivered, {} failed. Check Loki server for logs.",
        stats.delivered(),
        stats.failed()
    );
    Ok(())
}
