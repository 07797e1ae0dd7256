//! Feeds a stream of records through an engine, one write at a time.

use crate::domain::RawLogRecord;
use crate::engine::Engine;
use futures::{Stream, StreamExt, stream};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportSummary {
    pub delivered: u64,
    pub failed: u64,
}

impl TransportSummary {
    pub fn total(&self) -> u64 {
        self.delivered + self.failed
    }
}

/// Writes every record in arrival order.
///
/// A failed write is reported and skipped; it never ends the stream.
pub async fn pump<S>(engine: &Engine, records: S) -> TransportSummary
where
    S: Stream<Item = RawLogRecord>,
{
    let mut summary = TransportSummary::default();
    let mut records = std::pin::pin!(records);

    while let Some(record) = records.next().await {
        match engine.write_log(record, None).await {
            Ok(()) => summary.delivered += 1,
            Err(e) => {
                summary.failed += 1;
                error!(error = %e, "Failed to write log record");
            }
        }
    }

    debug!(
        delivered = summary.delivered,
        failed = summary.failed,
        "Record stream closed"
    );
    summary
}

/// Records from newline-delimited JSON. Blank lines are skipped; a line that
/// is not JSON becomes a record holding the line as its message. Invalid
/// UTF-8 is replaced, not dropped. Only EOF or a read error ends the stream.
pub fn ndjson_records<R>(reader: R) -> impl Stream<Item = RawLogRecord>
where
    R: AsyncBufRead + Unpin,
{
    stream::unfold((reader, Vec::new()), |(mut reader, mut buf)| async move {
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => return None,
                Ok(_) => {
                    let record = {
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim();
                        (!line.is_empty()).then(|| parse_line(line))
                    };
                    if let Some(record) = record {
                        return Some((record, (reader, buf)));
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to read input");
                    return None;
                }
            }
        }
    })
}

fn parse_line(line: &str) -> RawLogRecord {
    match serde_json::from_str::<Value>(line) {
        Ok(value) => RawLogRecord::from_value(value),
        Err(_) => RawLogRecord::from_value(Value::String(line.to_string())),
    }
}
