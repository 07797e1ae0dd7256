#![allow(dead_code)]

use parking_lot::Mutex;
use rask_cloud_logging::domain::LogEntry;
use rask_cloud_logging::sink::{AsyncSink, SinkError, SyncSink, WriteFuture};
use std::collections::HashSet;
use std::sync::Arc;

/// Keeps every entry written to it.
#[derive(Default)]
pub struct MemorySink {
    pub entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }
}

impl SyncSink for MemorySink {
    fn write_entry(&self, entry: &LogEntry) -> Result<(), SinkError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Remote-style sink that rejects the writes at the given positions.
#[derive(Default)]
pub struct ScriptedRemoteSink {
    reject: HashSet<usize>,
    calls: Mutex<usize>,
    pub written: Mutex<Vec<(String, LogEntry)>>,
}

impl ScriptedRemoteSink {
    pub fn rejecting(positions: &[usize]) -> Arc<Self> {
        Arc::new(Self {
            reject: positions.iter().copied().collect(),
            ..Self::default()
        })
    }

    pub fn written(&self) -> Vec<(String, LogEntry)> {
        self.written.lock().clone()
    }
}

impl AsyncSink for ScriptedRemoteSink {
    fn write_entry<'a>(&'a self, project_id: &'a str, entry: LogEntry) -> WriteFuture<'a> {
        Box::pin(async move {
            let position = {
                let mut calls = self.calls.lock();
                let position = *calls;
                *calls += 1;
                position
            };
            tokio::task::yield_now().await;

            if self.reject.contains(&position) {
                return Err(SinkError::Http {
                    status: 403,
                    body: "permission denied".to_string(),
                });
            }
            self.written.lock().push((project_id.to_string(), entry));
            Ok(())
        })
    }
}

/// Sink that fails every write.
pub struct FailingSink;

impl SyncSink for FailingSink {
    fn write_entry(&self, _entry: &LogEntry) -> Result<(), SinkError> {
        Err(SinkError::Io(std::io::Error::other("disk full")))
    }
}
