use crate::error::SinkError;
use crate::record::LogRecord;
use async_trait::async_trait;

/// Asynchronous destination for [`LogRecord`]s produced by the logging layer.
///
/// Implementations transport records to a concrete backend (Loki, stdout,
/// an in-memory buffer in tests). The layer calls `send` once per record
/// from a spawned task and never awaits it on the application thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single log record to the underlying backend.
    ///
    /// **Parameters**
    /// - `record`: fully-populated [`LogRecord`] produced by the layer.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted by the backend.
    /// - `Err(..)` if the backend failed (network error, serialization
    ///   error, HTTP status, etc.). The caller gets exactly one attempt;
    ///   nothing is retried or buffered.
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError>;

    /// Flush any buffered records, if the backend implements buffering.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
