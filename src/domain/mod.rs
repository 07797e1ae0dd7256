//! Domain layer for rask-cloud-logging.
//!
//! Contains the canonical types shared across all modules:
//! - `RawLogRecord`: an application log record as the logger produced it
//! - `LogEntry`: the Cloud Logging entry built from a record
//! - `Severity`: platform severity and the level-code mapping
//! - `HttpRequest`: the request metadata block elevated into an entry
//! - `EngineError`: the failure `write_log`/`write_request_log` propagate

pub mod entry;
pub mod error;
pub mod http_request;
pub mod record;
pub mod severity;

pub use entry::LogEntry;
pub use error::EngineError;
pub use http_request::{HttpRequest, Latency};
pub use record::{ErrorInfo, RawLogRecord};
pub use severity::Severity;
