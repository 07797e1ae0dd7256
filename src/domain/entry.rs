use super::http_request::HttpRequest;
use super::record::{SPAN_ID_KEY, TRACE_KEY, TRACE_SAMPLED_KEY};
use super::severity::Severity;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const STRUCTURED_LABELS_KEY: &str = "logging.googleapis.com/labels";

/// The metadata envelope of an entry: everything the platform indexes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_sampled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_request: Option<HttpRequest>,
}

impl EntryMetadata {
    pub fn new(severity: Severity, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            severity,
            labels: BTreeMap::new(),
            trace: None,
            span_id: None,
            trace_sampled: None,
            http_request: None,
        }
    }
}

/// A Cloud Logging entry: metadata envelope plus a free-form JSON payload.
///
/// Serializing a `LogEntry` yields the `LogEntry` resource of the
/// `entries:write` API. [`LogEntry::to_structured_json`] yields the
/// single-line form the logging agent scrapes from stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(flatten)]
    pub metadata: EntryMetadata,
    pub json_payload: Map<String, Value>,
}

impl LogEntry {
    pub fn new(metadata: EntryMetadata, json_payload: Map<String, Value>) -> Self {
        Self {
            metadata,
            json_payload,
        }
    }

    pub fn severity(&self) -> Severity {
        self.metadata.severity
    }

    pub fn message(&self) -> Option<&str> {
        self.json_payload.get("message").and_then(Value::as_str)
    }

    /// Byte length of the API representation.
    pub fn serialized_size(&self) -> Result<usize, serde_json::Error> {
        serde_json::to_vec(self).map(|bytes| bytes.len())
    }

    /// Payload fields first, then the envelope under the special keys the
    /// logging agent lifts back out of the line.
    pub fn to_structured_json(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let metadata = &self.metadata;
        let mut line = self.json_payload.clone();

        line.insert(
            "severity".to_string(),
            Value::String(metadata.severity.as_str().to_string()),
        );
        line.insert(
            "timestamp".to_string(),
            Value::String(format_timestamp(&metadata.timestamp)),
        );
        if let Some(http_request) = &metadata.http_request {
            line.insert("httpRequest".to_string(), serde_json::to_value(http_request)?);
        }
        if !metadata.labels.is_empty() {
            line.insert(
                STRUCTURED_LABELS_KEY.to_string(),
                serde_json::to_value(&metadata.labels)?,
            );
        }
        if let Some(trace) = &metadata.trace {
            line.insert(TRACE_KEY.to_string(), Value::String(trace.clone()));
        }
        if let Some(span_id) = &metadata.span_id {
            line.insert(SPAN_ID_KEY.to_string(), Value::String(span_id.clone()));
        }
        if let Some(sampled) = metadata.trace_sampled {
            line.insert(TRACE_SAMPLED_KEY.to_string(), Value::Bool(sampled));
        }

        Ok(line)
    }
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_timestamp<S: Serializer>(
    timestamp: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::http_request::Latency;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_entry() -> LogEntry {
        let timestamp = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let mut metadata = EntryMetadata::new(Severity::Warning, timestamp);
        metadata.labels.insert("env".to_string(), "prod".to_string());
        metadata.trace = Some("projects/p/traces/abc".to_string());
        metadata.span_id = Some("99".to_string());
        metadata.trace_sampled = Some(true);
        metadata.http_request = Some(HttpRequest {
            status: Some(200),
            latency: Some(Latency::from_millis(5)),
            ..Default::default()
        });

        let mut payload = Map::new();
        payload.insert("message".to_string(), json!("disk almost full"));
        payload.insert("disk".to_string(), json!("/dev/sda1"));
        LogEntry::new(metadata, payload)
    }

    #[test]
    fn test_api_representation() {
        let value = serde_json::to_value(sample_entry()).unwrap();
        assert_eq!(
            value,
            json!({
                "timestamp": "2023-11-14T22:13:20.123Z",
                "severity": "WARNING",
                "labels": {"env": "prod"},
                "trace": "projects/p/traces/abc",
                "spanId": "99",
                "traceSampled": true,
                "httpRequest": {"status": 200, "latency": "0.005000000s"},
                "jsonPayload": {"message": "disk almost full", "disk": "/dev/sda1"},
            })
        );
    }

    #[test]
    fn test_api_representation_omits_absent_metadata() {
        let timestamp = Utc.timestamp_millis_opt(0).unwrap();
        let entry = LogEntry::new(EntryMetadata::new(Severity::Info, timestamp), Map::new());
        let value = serde_json::to_value(entry).unwrap();
        assert_eq!(
            value,
            json!({
                "timestamp": "1970-01-01T00:00:00.000Z",
                "severity": "INFO",
                "jsonPayload": {},
            })
        );
    }

    #[test]
    fn test_structured_json_lifts_envelope_to_special_keys() {
        let line = sample_entry().to_structured_json().unwrap();
        let keys: Vec<&str> = line.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "message",
                "disk",
                "severity",
                "timestamp",
                "httpRequest",
                STRUCTURED_LABELS_KEY,
                TRACE_KEY,
                SPAN_ID_KEY,
                TRACE_SAMPLED_KEY,
            ]
        );
        assert_eq!(line["severity"], json!("WARNING"));
        assert_eq!(line[TRACE_SAMPLED_KEY], json!(true));
        assert_eq!(line[STRUCTURED_LABELS_KEY], json!({"env": "prod"}));
    }
}
