//! The field-mapping rules that turn a raw record into entry parts.
//!
//! Everything here is pure; the [`Engine`](super::Engine) supplies its
//! configuration and trace agent and assembles the results.

use super::config::ServiceContext;
use crate::domain::record::{HOSTNAME_KEY, HTTP_REQUEST_KEY, PID_KEY, is_reserved};
use crate::domain::{ErrorInfo, HttpRequest, RawLogRecord, Severity};
use crate::trace::{TraceAgentBridge, TraceContext};
use serde_json::{Map, Value};

/// Marks a payload as an error event for error reporting.
pub const ERROR_EVENT_TYPE: &str =
    "type.googleapis.com/google.devtools.clouderrorreporting.v1beta1.ReportedErrorEvent";
pub const ERROR_EVENT_TYPE_KEY: &str = "@type";
pub const SERVICE_CONTEXT_KEY: &str = "serviceContext";
pub const PAYLOAD_ERROR_KEY: &str = "error";
pub const PAYLOAD_MESSAGE_KEY: &str = "message";

/// Severity of a record; records without a numeric level get `DEFAULT`.
///
/// [`Severity::from_level`] only sees numeric codes, where anything below 30
/// is `DEBUG`. A record with no level says nothing about importance, so it
/// is left unclassified instead.
pub fn severity_of(record: &RawLogRecord) -> Severity {
    record
        .level()
        .map_or(Severity::Default, Severity::from_level)
}

/// Message text with the prefix applied and any stack trace appended.
pub fn format_message(record: &RawLogRecord, prefix: Option<&str>) -> String {
    let mut message = record.message().unwrap_or_default();

    if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
        message = format!("[{prefix}] {message}");
    }

    if let Some(stack) = record.error().as_ref().and_then(ErrorInfo::stack) {
        if message.is_empty() {
            message = stack.to_string();
        } else {
            message.push('\n');
            message.push_str(stack);
        }
    }

    message
}

/// Correlation fields of a record. Each field is taken from the record on
/// its own; only the trace falls back to the ambient agent.
pub fn extract_trace(record: &RawLogRecord, agent: &TraceAgentBridge) -> TraceContext {
    TraceContext {
        trace: record.trace().or_else(|| agent.current_trace()),
        span_id: record.span_id(),
        sampled: record.trace_sampled(),
    }
}

/// The payload body: every non-reserved field, the error summary and the
/// provenance fields.
pub fn build_metadata(record: &RawLogRecord) -> Map<String, Value> {
    let mut payload: Map<String, Value> = record
        .fields()
        .iter()
        .filter(|(key, _)| !is_reserved(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if let Some(error) = record.error() {
        let mut summary = Map::new();
        if let Some(kind) = error.kind {
            summary.insert("type".to_string(), Value::String(kind));
        }
        if let Some(message) = error.message {
            summary.insert("message".to_string(), Value::String(message));
        }
        payload.insert(PAYLOAD_ERROR_KEY.to_string(), Value::Object(summary));
    }

    for key in [PID_KEY, HOSTNAME_KEY] {
        if let Some(value) = record.get(key) {
            payload.insert(key.to_string(), value.clone());
        }
    }

    payload
}

/// Outcome of reading the record's `httpRequest` field.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpRequestField {
    Absent,
    Elevated(HttpRequest),
    /// Not a request block; stays in the payload as-is.
    Malformed(Value),
}

pub fn http_request_of(record: &RawLogRecord) -> HttpRequestField {
    let Some(value) = record.http_request() else {
        return HttpRequestField::Absent;
    };
    match serde_json::from_value::<HttpRequest>(value.clone()) {
        Ok(request) if value.is_object() => HttpRequestField::Elevated(request),
        _ => HttpRequestField::Malformed(value.clone()),
    }
}

/// Whether the entry must be annotated for error reporting.
pub fn is_error_report(
    service_context: Option<&ServiceContext>,
    severity: Severity,
    error: Option<&ErrorInfo>,
) -> bool {
    service_context.is_some()
        && severity.is_reportable()
        && error.and_then(ErrorInfo::stack).is_some()
}

pub fn annotate_error_report(
    payload: &mut Map<String, Value>,
    service_context: &ServiceContext,
) -> Result<(), serde_json::Error> {
    payload.insert(
        ERROR_EVENT_TYPE_KEY.to_string(),
        Value::String(ERROR_EVENT_TYPE.to_string()),
    );
    payload.insert(
        SERVICE_CONTEXT_KEY.to_string(),
        serde_json::to_value(service_context)?,
    );
    Ok(())
}

/// Places a malformed request block back into the payload.
pub fn keep_malformed_http_request(payload: &mut Map<String, Value>, value: Value) {
    payload.insert(HTTP_REQUEST_KEY.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{SPAN_ID_KEY, TRACE_KEY, TRACE_SAMPLED_KEY};
    use crate::trace::TraceAgent;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn record(value: Value) -> RawLogRecord {
        RawLogRecord::from_value(value)
    }

    struct AmbientAgent;

    impl TraceAgent for AmbientAgent {
        fn context_id(&self) -> Option<String> {
            Some("ambient".to_string())
        }

        fn writer_project_id(&self) -> Option<String> {
            Some("agent-proj".to_string())
        }

        fn root_span_trace_context(&self) -> Option<String> {
            Some("ambient/777;o=1".to_string())
        }
    }

    #[test]
    fn test_severity_of_absent_level_is_default() {
        assert_eq!(severity_of(&record(json!({}))), Severity::Default);
        assert_eq!(severity_of(&record(json!({"level": "warn"}))), Severity::Default);
        assert_eq!(severity_of(&record(json!({"level": 35}))), Severity::Info);
    }

    #[test]
    fn test_format_message_plain() {
        assert_eq!(format_message(&record(json!({"msg": "m"})), None), "m");
    }

    #[test]
    fn test_format_message_prefix() {
        assert_eq!(
            format_message(&record(json!({"msg": "m"})), Some("svc")),
            "[svc] m"
        );
        assert_eq!(format_message(&record(json!({"msg": "m"})), Some("")), "m");
    }

    #[test]
    fn test_format_message_stack_only() {
        let r = record(json!({"err": {"stack": "S"}}));
        assert_eq!(format_message(&r, None), "S");
    }

    #[test]
    fn test_format_message_appends_stack() {
        let r = record(json!({"msg": "failed", "err": {"message": "boom", "stack": "S"}}));
        assert_eq!(format_message(&r, None), "failed\nS");
        assert_eq!(format_message(&r, Some("svc")), "[svc] failed\nS");
    }

    #[test]
    fn test_format_message_missing() {
        assert_eq!(format_message(&record(json!({"level": 30})), None), "");
    }

    #[test]
    fn test_extract_trace_from_record() {
        let r = record(json!({
            TRACE_KEY: "projects/p/traces/t",
            SPAN_ID_KEY: "5",
            TRACE_SAMPLED_KEY: false,
        }));
        let bridge = TraceAgentBridge::new(Arc::new(AmbientAgent));
        assert_eq!(
            extract_trace(&r, &bridge),
            TraceContext {
                trace: Some("projects/p/traces/t".to_string()),
                span_id: Some("5".to_string()),
                sampled: Some(false),
            }
        );
    }

    #[test]
    fn test_extract_trace_agent_fallback_is_trace_only() {
        let bridge = TraceAgentBridge::new(Arc::new(AmbientAgent));
        let context = extract_trace(&record(json!({"msg": "x"})), &bridge);
        assert_eq!(
            context.trace.as_deref(),
            Some("projects/agent-proj/traces/ambient")
        );
        assert_eq!(context.span_id, None);
        assert_eq!(context.sampled, None);
    }

    #[test]
    fn test_extract_trace_fields_are_independent() {
        let r = record(json!({SPAN_ID_KEY: "9"}));
        let context = extract_trace(&r, &TraceAgentBridge::disabled());
        assert_eq!(context.trace, None);
        assert_eq!(context.span_id.as_deref(), Some("9"));
    }

    #[test]
    fn test_build_metadata_drops_reserved_keys() {
        let r = record(json!({"level": 30, "time": 1, "msg": "x", "foo": "bar"}));
        assert_eq!(Value::Object(build_metadata(&r)), json!({"foo": "bar"}));
    }

    #[test]
    fn test_build_metadata_error_summary_excludes_stack() {
        let r = record(json!({
            "err": {"type": "TypeError", "message": "boom", "stack": "TypeError: boom"},
        }));
        assert_eq!(
            Value::Object(build_metadata(&r)),
            json!({"error": {"type": "TypeError", "message": "boom"}})
        );
    }

    #[test]
    fn test_build_metadata_readds_provenance() {
        let r = record(json!({"pid": 42, "hostname": "web-1", "a": 1}));
        let payload = build_metadata(&r);
        let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "pid", "hostname"]);
        assert_eq!(payload["pid"], json!(42));
    }

    #[test]
    fn test_http_request_field() {
        assert_eq!(http_request_of(&record(json!({}))), HttpRequestField::Absent);
        assert_eq!(
            http_request_of(&record(json!({"httpRequest": {"status": 200}}))),
            HttpRequestField::Elevated(HttpRequest {
                status: Some(200),
                ..Default::default()
            })
        );
        assert_eq!(
            http_request_of(&record(json!({"httpRequest": {"status": "teapot"}}))),
            HttpRequestField::Malformed(json!({"status": "teapot"}))
        );
        assert_eq!(
            http_request_of(&record(json!({"httpRequest": "GET /"}))),
            HttpRequestField::Malformed(json!("GET /"))
        );
    }

    #[test]
    fn test_error_report_conditions() {
        let ctx = ServiceContext::new("api");
        let with_stack = ErrorInfo {
            stack: Some("S".to_string()),
            ..Default::default()
        };
        let without_stack = ErrorInfo::default();

        for has_ctx in [false, true] {
            for severe in [false, true] {
                for has_stack in [false, true] {
                    let severity = if severe { Severity::Error } else { Severity::Warning };
                    let error = if has_stack { &with_stack } else { &without_stack };
                    assert_eq!(
                        is_error_report(has_ctx.then_some(&ctx), severity, Some(error)),
                        has_ctx && severe && has_stack,
                    );
                }
            }
        }
        assert!(is_error_report(Some(&ctx), Severity::Critical, Some(&with_stack)));
        assert!(!is_error_report(Some(&ctx), Severity::Critical, None));
    }

    #[test]
    fn test_annotate_error_report() {
        let mut payload = Map::new();
        annotate_error_report(&mut payload, &ServiceContext::new("api").with_version("2")).unwrap();
        assert_eq!(
            Value::Object(payload),
            json!({
                "@type": ERROR_EVENT_TYPE,
                "serviceContext": {"service": "api", "version": "2"},
            })
        );
    }

    proptest! {
        #[test]
        fn prop_payload_partition(
            extra in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..8),
            level in any::<i64>(),
        ) {
            let mut r = RawLogRecord::new()
                .with("level", level)
                .with("time", 1)
                .with("msg", "x")
                .with("labels", json!({"k": "v"}))
                .with(TRACE_KEY, "projects/p/traces/t");
            for (key, value) in &extra {
                r.insert(key.clone(), *value);
            }

            let payload = build_metadata(&r);
            for (key, value) in &extra {
                if !is_reserved(key) {
                    prop_assert_eq!(payload.get(key), Some(&json!(value)));
                }
            }
            for key in payload.keys() {
                prop_assert!(!is_reserved(key) || key == PID_KEY || key == HOSTNAME_KEY);
            }
        }
    }
}
