/// Error returned by a [`LogSink`](crate::sink::LogSink) when a record
/// could not be delivered.
///
/// Retryable and fatal failures are not distinguished; the layer reports
/// every variant the same way and drops the record.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    /// DNS, connect, TLS or timeout failure before a response arrived.
    #[cfg(feature = "loki")]
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to serialize push request: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The send time cannot be expressed as epoch nanoseconds in an `i64`.
    #[error("timestamp out of range for nanosecond precision")]
    TimestampOutOfRange,

    /// Catch-all for custom sinks that do not map onto the variants above.
    #[error("{0}")]
    Other(String),
}

impl SinkError {
    /// HTTP status code, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            SinkError::Status { status, .. } => Some(*status),
            #[cfg(feature = "loki")]
            SinkError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Response body, when the server sent one.
    pub fn body(&self) -> Option<&str> {
        match self {
            SinkError::Status { body, .. } => Some(body.as_str()),
            _ => None,
        }
    }
}

/// Error returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("no tokio runtime available to deliver log records")]
    NoRuntime,

    #[error("log records cannot be delivered synchronously on a current-thread tokio runtime")]
    CurrentThreadRuntime,

    #[error("failed to set global subscriber: {0}")]
    SetGlobalDefault(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Error returned when reading configuration from the environment.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}
