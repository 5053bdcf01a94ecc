use crate::error::{InitError, SinkError};
use crate::record::{LogRecord, Severity};
use crate::sink::LogSink;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use std::thread;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Targets whose events are never shipped. Our own diagnostics and the HTTP
/// stack's events would otherwise feed back into the sink.
const INTERNAL_TARGETS: &[&str] =
    &["loki_log_sink", "reqwest", "hyper", "h2", "rustls", "tokio_util"];

fn is_internal(target: &str) -> bool {
    INTERNAL_TARGETS.iter().any(|prefix| {
        target == *prefix || target.strip_prefix(prefix).is_some_and(|rest| rest.starts_with("::"))
    })
}

/// Delivery counters shared between the layer and whoever installed it.
#[derive(Clone, Debug, Default)]
pub struct LayerStats {
    /// Events that passed the level and target filters.
    pub seen: Arc<AtomicU64>,
    /// Records the sink accepted.
    pub delivered: Arc<AtomicU64>,
    /// Records dropped after a failed send.
    pub failed: Arc<AtomicU64>,
}

impl LayerStats {
    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Records whose delivery has finished, successfully or not.
    pub fn completed(&self) -> u64 {
        self.delivered() + self.failed()
    }
}

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// hands each one to a [`LogSink`] before the log call returns.
///
/// Every accepted event triggers exactly one send, driven to completion on
/// the captured multi-thread Tokio runtime while the emitting thread waits.
/// Records from one thread therefore reach the sink in emit order. There is
/// no queue, no batching and no retry: a failed send is reported by
/// [`deliver`] and the record is dropped.
pub struct LokiLayer {
    sink: Arc<dyn LogSink>,
    runtime: Handle,
    min_level: Level,
    stats: LayerStats,
}

impl LokiLayer {
    /// Create a layer bound to the Tokio runtime of the calling context.
    ///
    /// Events more verbose than `min_level` are ignored.
    pub fn new(sink: Arc<dyn LogSink>, min_level: Level) -> Result<Self, InitError> {
        let runtime = Handle::try_current().map_err(|_| InitError::NoRuntime)?;
        Self::with_handle(sink, min_level, runtime)
    }

    /// Create a layer that drives deliveries on an explicit runtime handle.
    ///
    /// The runtime must be multi-threaded: a current-thread scheduler cannot
    /// make progress on a send while the thread that owns it is waiting.
    pub fn with_handle(
        sink: Arc<dyn LogSink>,
        min_level: Level,
        runtime: Handle,
    ) -> Result<Self, InitError> {
        if runtime.runtime_flavor() == RuntimeFlavor::CurrentThread {
            return Err(InitError::CurrentThreadRuntime);
        }
        Ok(LokiLayer {
            sink,
            runtime,
            min_level,
            stats: LayerStats::default(),
        })
    }

    pub fn stats(&self) -> LayerStats {
        self.stats.clone()
    }

    /// Run one delivery to completion on the calling thread.
    fn deliver_blocking(&self, record: &LogRecord) -> bool {
        let delivery = deliver(&*self.sink, record);
        match Handle::try_current().map(|current| current.runtime_flavor()) {
            Ok(RuntimeFlavor::MultiThread) => {
                tokio::task::block_in_place(|| self.runtime.block_on(delivery))
            }
            // Inside a current-thread scheduler; block_in_place is not allowed there.
            Ok(_) => thread::scope(|scope| {
                scope.spawn(|| self.runtime.block_on(delivery)).join().unwrap_or(false)
            }),
            Err(_) => self.runtime.block_on(delivery),
        }
    }
}

/// Send one record and report the outcome.
///
/// This is the failure boundary: errors are printed with the status code
/// and response body when present, then swallowed.
///
/// **Returns**
/// - `true` if the sink accepted the record, `false` otherwise.
pub async fn deliver(sink: &dyn LogSink, record: &LogRecord) -> bool {
    match sink.send(record).await {
        Ok(()) => true,
        Err(e) => {
            report_failure(&e);
            false
        }
    }
}

fn report_failure(err: &SinkError) {
    println!("failed to send log to Loki: {}", err);
    if let Some(status) = err.status() {
        println!("response status code: {}", status);
    }
    if let Some(body) = err.body() {
        println!("response text: {}", body);
    }
}

impl<S> Layer<S> for LokiLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.min_level || is_internal(meta.target()) {
            return;
        }
        self.stats.seen.fetch_add(1, Ordering::Relaxed);

        let mut metadata = BTreeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor { fields: &mut metadata, message: &mut message };
        event.record(&mut visitor);

        let record = LogRecord {
            timestamp: Utc::now(),
            level: Severity::from(meta.level()),
            message: message.unwrap_or_default(),
            metadata,
        };

        if self.deliver_blocking(&record) {
            self.stats.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Collects event fields as strings; the `message` field becomes the line.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, String>,
    pub message: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            *self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}
