use crate::domain::record::{HOSTNAME_KEY, LEVEL_KEY, MESSAGE_KEY, PID_KEY, TIME_KEY};
use crate::domain::{EngineError, RawLogRecord};
use crate::engine::Engine;
use chrono::Utc;
use serde_json::{Map, Value, json};
use std::sync::{Arc, OnceLock};

/// Numeric level codes stamped on records.
pub mod levels {
    pub const TRACE: i64 = 10;
    pub const DEBUG: i64 = 20;
    pub const INFO: i64 = 30;
    pub const WARN: i64 = 40;
    pub const ERROR: i64 = 50;
    pub const FATAL: i64 = 60;
}

static HOSTNAME: OnceLock<Option<String>> = OnceLock::new();

fn local_hostname() -> Option<String> {
    HOSTNAME
        .get_or_init(|| {
            hostname::get()
                .ok()
                .and_then(|name| name.into_string().ok())
        })
        .clone()
}

/// Application logger that feeds records straight into an [`Engine`].
///
/// Cloning is cheap; children share the engine and carry their own bindings.
#[derive(Clone)]
pub struct Logger {
    engine: Arc<Engine>,
    bindings: Map<String, Value>,
    pid: u32,
    hostname: Option<String>,
}

impl Logger {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            bindings: Map::new(),
            pid: std::process::id(),
            hostname: local_hostname(),
        }
    }

    /// A logger whose records carry `bindings` on top of this one's.
    #[must_use]
    pub fn child(&self, bindings: Map<String, Value>) -> Self {
        let mut merged = self.bindings.clone();
        merged.extend(bindings);
        Self {
            bindings: merged,
            ..self.clone()
        }
    }

    pub fn bindings(&self) -> &Map<String, Value> {
        &self.bindings
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// The record a call at `level` would produce.
    pub fn record(&self, level: i64, fields: Map<String, Value>, msg: &str) -> RawLogRecord {
        let mut record = RawLogRecord::new()
            .with(LEVEL_KEY, level)
            .with(TIME_KEY, Utc::now().timestamp_millis())
            .with(PID_KEY, self.pid);
        if let Some(hostname) = &self.hostname {
            record.insert(HOSTNAME_KEY, hostname.clone());
        }
        for (key, value) in self.bindings.iter().chain(fields.iter()) {
            record.insert(key.clone(), value.clone());
        }
        if !msg.is_empty() {
            record.insert(MESSAGE_KEY, msg);
        }
        record
    }

    pub async fn log_at(
        &self,
        level: i64,
        fields: Map<String, Value>,
        msg: &str,
    ) -> Result<(), EngineError> {
        self.engine
            .write_log(self.record(level, fields, msg), None)
            .await
    }

    pub async fn trace(&self, msg: &str) -> Result<(), EngineError> {
        self.log_at(levels::TRACE, Map::new(), msg).await
    }

    pub async fn debug(&self, msg: &str) -> Result<(), EngineError> {
        self.log_at(levels::DEBUG, Map::new(), msg).await
    }

    pub async fn info(&self, msg: &str) -> Result<(), EngineError> {
        self.log_at(levels::INFO, Map::new(), msg).await
    }

    pub async fn warn(&self, msg: &str) -> Result<(), EngineError> {
        self.log_at(levels::WARN, Map::new(), msg).await
    }

    pub async fn error(&self, msg: &str) -> Result<(), EngineError> {
        self.log_at(levels::ERROR, Map::new(), msg).await
    }

    pub async fn fatal(&self, msg: &str) -> Result<(), EngineError> {
        self.log_at(levels::FATAL, Map::new(), msg).await
    }

    /// Logs `err` at ERROR with its source chain as the stack.
    pub async fn error_with<E>(&self, err: &E, msg: &str) -> Result<(), EngineError>
    where
        E: std::error::Error,
    {
        let mut fields = Map::new();
        fields.insert("err".to_string(), error_object(err));
        self.log_at(levels::ERROR, fields, msg).await
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("bindings", &self.bindings)
            .field("pid", &self.pid)
            .field("hostname", &self.hostname)
            .finish_non_exhaustive()
    }
}

fn error_object<E: std::error::Error>(err: &E) -> Value {
    let full_name = std::any::type_name::<E>();
    let kind = full_name.rsplit("::").next().unwrap_or(full_name);

    let mut stack = format!("{kind}: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        stack.push_str(&format!("\n    caused by: {cause}"));
        source = cause.source();
    }

    json!({
        "type": kind,
        "message": err.to_string(),
        "stack": stack,
    })
}
