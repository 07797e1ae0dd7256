#![warn(rust_2018_idioms)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_possible_truncation, // Level codes and latencies stay within realistic bounds
    clippy::cast_sign_loss,           // Safe where values are known non-negative
    clippy::missing_errors_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. SinkError in sink module
    clippy::must_use_candidate        // Annotated selectively on critical APIs
)]

pub mod app;
pub mod domain;
pub mod engine;
pub mod logger;
pub mod middleware;
pub mod sink;
pub mod trace;
pub mod transport;

// Re-export main types for easy access
pub use app::{App, Config};
pub use domain::{EngineError, LogEntry, RawLogRecord, Severity};
pub use engine::{Engine, EngineConfig};
pub use logger::Logger;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
