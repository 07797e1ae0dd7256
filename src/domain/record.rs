use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const LEVEL_KEY: &str = "level";
pub const TIME_KEY: &str = "time";
pub const MESSAGE_KEY: &str = "msg";
pub const PID_KEY: &str = "pid";
pub const HOSTNAME_KEY: &str = "hostname";
pub const ERROR_KEY: &str = "err";
pub const HTTP_REQUEST_KEY: &str = "httpRequest";
pub const LABELS_KEY: &str = "labels";
pub const TRACE_KEY: &str = "logging.googleapis.com/trace";
pub const SPAN_ID_KEY: &str = "logging.googleapis.com/spanId";
pub const TRACE_SAMPLED_KEY: &str = "logging.googleapis.com/trace_sampled";

/// Keys the engine consumes itself; everything else is user payload.
pub const RESERVED_KEYS: [&str; 11] = [
    LEVEL_KEY,
    TIME_KEY,
    MESSAGE_KEY,
    PID_KEY,
    HOSTNAME_KEY,
    ERROR_KEY,
    HTTP_REQUEST_KEY,
    LABELS_KEY,
    TRACE_KEY,
    SPAN_ID_KEY,
    TRACE_SAMPLED_KEY,
];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// One application log record, as the upstream logger produced it.
///
/// The schema is open: any key outside [`RESERVED_KEYS`] is carried through
/// to the entry payload untouched, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawLogRecord {
    fields: Map<String, Value>,
}

/// The error triple a record may carry under `err`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: Option<String>,
    pub message: Option<String>,
    pub stack: Option<String>,
}

impl ErrorInfo {
    /// The stack text, if there is any worth reporting.
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref().filter(|s| !s.is_empty())
    }
}

impl RawLogRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Wraps a decoded JSON value. Anything that is not an object becomes a
    /// record whose only field is its text under `msg`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            Value::String(text) => Self::new().with(MESSAGE_KEY, text),
            other => Self::new().with(MESSAGE_KEY, other.to_string()),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Level code; floats are truncated toward zero.
    pub fn level(&self) -> Option<i64> {
        let value = self.fields.get(LEVEL_KEY)?;
        value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
    }

    /// Event time in milliseconds since the epoch.
    pub fn time_millis(&self) -> Option<i64> {
        let value = self.fields.get(TIME_KEY)?;
        value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
    }

    pub fn message(&self) -> Option<String> {
        match self.fields.get(MESSAGE_KEY)? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        match self.fields.get(ERROR_KEY)? {
            Value::Object(err) => Some(ErrorInfo {
                kind: string_field(err, "type"),
                message: string_field(err, "message"),
                stack: string_field(err, "stack"),
            }),
            Value::String(text) => Some(ErrorInfo {
                message: Some(text.clone()),
                ..Default::default()
            }),
            _ => None,
        }
    }

    pub fn http_request(&self) -> Option<&Value> {
        self.fields.get(HTTP_REQUEST_KEY).filter(|v| !v.is_null())
    }

    /// Record labels; non-string values are rendered as JSON text.
    pub fn labels(&self) -> BTreeMap<String, String> {
        let Some(Value::Object(labels)) = self.fields.get(LABELS_KEY) else {
            return BTreeMap::new();
        };
        labels
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect()
    }

    pub fn trace(&self) -> Option<String> {
        self.fields
            .get(TRACE_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn span_id(&self) -> Option<String> {
        match self.fields.get(SPAN_ID_KEY)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn trace_sampled(&self) -> Option<bool> {
        match self.fields.get(TRACE_SAMPLED_KEY)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => Some(s == "true" || s == "1"),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for RawLogRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_fields(fields)
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}
