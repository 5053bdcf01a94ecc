use std::time::Duration;

use loki_log_sink::layer::deliver;
use loki_log_sink::loki::{LokiConfig, LokiSink};
use loki_log_sink::record::{LogRecord, Severity};

/// Posts one record per level straight to the Loki push API, without
/// going through `tracing`. Failures are printed and the demo carries on.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Point this at your Loki instance; "tenant1" matches a local
    // multi-tenant setup. On Grafana Cloud use the API key as password.
    let config = LokiConfig::new("http://localhost:3100", "dev", "rust", "my-computer")
        .with_tenant("tenant1")
        .with_level_label(true)
        .with_timeout(Duration::from_secs(10));
    let sink = LokiSink::new(config)?;

    let records = [
        LogRecord::new(Severity::Info, "This is an informational message posted from Rust"),
        LogRecord::new(Severity::Warning, "This is a warning message posted from Rust"),
        LogRecord::new(Severity::Error, "This is an error message posted from Rust"),
        LogRecord::new(Severity::Debug, "This is a debug message posted from Rust"),
    ];

    for record in &records {
        if deliver(&sink, record).await {
            println!("sent to {}: [{}] {}", sink.push_url(), record.level, record.message);
        }
    }

    println!("Execution complete. Check Loki server for logs.");
    Ok(())
}
