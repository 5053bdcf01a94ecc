//! Request body of the Loki push API (`POST /loki/api/v1/push`).
//!
//! ```json
//! {"streams":[{"stream":{"application":"a","environment":"e","host":"h"},
//!              "values":[["1700000000000000000","2024-01-01 00:00:00.000 [INFO] hi"]]}]}
//! ```

use crate::error::SinkError;
use crate::record::LogRecord;
use chrono::{DateTime, Utc};
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;

/// Label set attached to a stream.
pub type StreamLabels = BTreeMap<String, String>;

/// Render the display line: `YYYY-MM-DD HH:MM:SS.mmm [LEVEL] message`.
pub fn format_line(record: &LogRecord) -> String {
    format!(
        "{} [{}] {}",
        record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        record.level,
        record.message
    )
}

/// Epoch nanoseconds as the decimal string Loki expects.
pub fn epoch_nanos(at: DateTime<Utc>) -> Result<String, SinkError> {
    at.timestamp_nanos_opt()
        .map(|ns| ns.to_string())
        .ok_or(SinkError::TimestampOutOfRange)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushRequest {
    pub streams: Vec<Stream>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stream {
    pub stream: StreamLabels,
    pub values: Vec<Entry>,
}

/// One `[timestamp, line]` pair, optionally followed by structured metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub timestamp: String,
    pub line: String,
    pub metadata: Option<BTreeMap<String, String>>,
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.metadata.is_some() { 3 } else { 2 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.timestamp)?;
        seq.serialize_element(&self.line)?;
        if let Some(metadata) = &self.metadata {
            seq.serialize_element(metadata)?;
        }
        seq.end()
    }
}

impl PushRequest {
    /// Build a request carrying exactly one stream with exactly one value.
    ///
    /// **Parameters**
    /// - `labels`: full label set for the stream.
    /// - `record`: the record to render.
    /// - `sent_at`: send time, used as the entry timestamp.
    /// - `with_metadata`: attach the record's fields as structured metadata
    ///   (skipped when the record has none).
    pub fn single(
        labels: StreamLabels,
        record: &LogRecord,
        sent_at: DateTime<Utc>,
        with_metadata: bool,
    ) -> Result<Self, SinkError> {
        let metadata =
            (with_metadata && !record.metadata.is_empty()).then(|| record.metadata.clone());
        let entry = Entry {
            timestamp: epoch_nanos(sent_at)?,
            line: format_line(record),
            metadata,
        };

        Ok(PushRequest {
            streams: vec![Stream { stream: labels, values: vec![entry] }],
        })
    }

    pub fn to_json(&self) -> Result<String, SinkError> {
        Ok(serde_json::to_string(self)?)
    }
}
