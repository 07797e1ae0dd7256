//! Write destinations for entries.
//!
//! A [`Sink`] is chosen once when an engine is built and never changes:
//! either a synchronous writer (stdout, scraped by the logging agent) or an
//! asynchronous one (the `entries:write` API).

pub mod credentials;
pub mod governance;
pub mod metadata;
pub mod remote;
pub mod stdout;

pub use credentials::{Credentials, CredentialsError, TokenProvider};
pub use remote::{CloudLoggingClient, MonitoredResource, RemoteConfig};
pub use stdout::StdoutSink;

use crate::domain::LogEntry;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("HTTP error: {status} - {body}")]
    Http { status: u16, body: String },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Credentials error: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("Entry of {size} bytes exceeds the {max} byte limit")]
    EntryTooLarge { size: usize, max: usize },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type WriteFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;

/// Destination written in place; a write never suspends.
pub trait SyncSink: Send + Sync {
    fn write_entry(&self, entry: &LogEntry) -> Result<(), SinkError>;
}

/// Destination written over the network.
///
/// This trait is dyn-compatible by using boxed futures instead of `impl Future`.
pub trait AsyncSink: Send + Sync {
    fn write_entry<'a>(&'a self, project_id: &'a str, entry: LogEntry) -> WriteFuture<'a>;
}

#[derive(Clone)]
pub enum Sink {
    Sync(Arc<dyn SyncSink>),
    Async(Arc<dyn AsyncSink>),
}

impl Sink {
    pub fn stdout() -> Self {
        Sink::Sync(Arc::new(StdoutSink::stdout()))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Sink::Async(_))
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sink::Sync(_) => f.write_str("Sink::Sync"),
            Sink::Async(_) => f.write_str("Sink::Async"),
        }
    }
}
