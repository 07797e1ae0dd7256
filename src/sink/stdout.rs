use super::{SinkError, SyncSink};
use crate::domain::LogEntry;
use parking_lot::Mutex;
use std::io::Write;

/// Writes each entry as one structured JSON line.
///
/// The logging agent on the host lifts severity, trace and labels back out of
/// the special keys, so no API call or project id is involved.
pub struct StdoutSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl StdoutSink {
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl SyncSink for StdoutSink {
    fn write_entry(&self, entry: &LogEntry) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&entry.to_structured_json()?)?;
        line.push(b'\n');

        let mut writer = self.writer.lock();
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for StdoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdoutSink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;
    use crate::domain::entry::EntryMetadata;
    use chrono::{TimeZone, Utc};
    use serde_json::{Map, Value, json};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writes_one_line_per_entry() {
        let buffer = SharedBuffer::default();
        let sink = StdoutSink::with_writer(Box::new(buffer.clone()));

        let timestamp = Utc.timestamp_millis_opt(1_000).unwrap();
        let mut payload = Map::new();
        payload.insert("message".to_string(), json!("hello"));
        let entry = LogEntry::new(EntryMetadata::new(Severity::Info, timestamp), payload);

        sink.write_entry(&entry).unwrap();
        sink.write_entry(&entry).unwrap();

        let output = String::from_utf8(buffer.0.lock().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let line: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(line["message"], json!("hello"));
        assert_eq!(line["severity"], json!("INFO"));
        assert_eq!(line["timestamp"], json!("1970-01-01T00:00:01.000Z"));
    }
}
