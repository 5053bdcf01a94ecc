use crate::error::InitError;
use crate::layer::{LayerStats, LokiLayer};
use crate::sink::LogSink;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;

/// Configuration of the logging layer.
///
/// **Fields**
/// - `min_level`: most verbose level that is still shipped to the sink.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked on top of [`LokiLayer`] so events are also printed locally.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub min_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            min_level: Level::DEBUG,
            enable_stdout: true,
        }
    }
}

/// Initialize the global `tracing` subscriber using the provided sink and
/// [`LayerConfig`].
///
/// **Parameters**
/// - `sink`: implementation of [`LogSink`] that will receive every
///   accepted [`LogRecord`](crate::record::LogRecord).
/// - `config`: [`LayerConfig`] controlling level threshold and console
///   output.
///
/// **Returns**
/// - [`LayerStats`] to observe delivery outcomes.
/// - `Err(InitError::NoRuntime)` when called outside a Tokio runtime.
/// - `Err(InitError::CurrentThreadRuntime)` when the current runtime uses
///   the current-thread scheduler.
/// - `Err(InitError::SetGlobalDefault)` when a global subscriber already
///   exists.
pub fn init_tracing_with_config(
    sink: Arc<dyn LogSink>,
    config: LayerConfig,
) -> Result<LayerStats, InitError> {
    let layer = LokiLayer::new(sink, config.min_level)?;
    let stats = layer.stats();

    // The two subscriber stacks have different types, so each branch installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_filter(LevelFilter::from_level(config.min_level));
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(stats)
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`].
pub fn init_tracing(sink: Arc<dyn LogSink>) -> Result<LayerStats, InitError> {
    init_tracing_with_config(sink, LayerConfig::default())
}
