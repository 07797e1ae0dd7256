use regex::Regex;
use std::sync::OnceLock;

/// Inbound header carrying `TRACE_ID/SPAN_ID;o=FLAG`.
pub const TRACE_CONTEXT_HEADER: &str = "x-cloud-trace-context";

const TRACE_HEADER_PATTERN: &str = r"(?i)^([a-f0-9]+)(?:/(\d+))?(?:;o=(\d))?$";

static TRACE_HEADER_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn trace_header_regex() -> Option<&'static Regex> {
    TRACE_HEADER_REGEX
        .get_or_init(|| Regex::new(TRACE_HEADER_PATTERN).ok())
        .as_ref()
}

/// Result of parsing a propagation header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceHeader {
    pub trace: Option<String>,
    pub span_id: Option<String>,
    pub sampled: bool,
}

/// Parses a propagation header into a trace resource name, span id and
/// sampling flag. Never fails: anything unparsable yields the empty result.
pub fn parse_trace_header(header: &str, project_id: &str) -> TraceHeader {
    if header.is_empty() || project_id.is_empty() {
        return TraceHeader::default();
    }

    let Some(captures) = trace_header_regex().and_then(|re| re.captures(header)) else {
        return TraceHeader::default();
    };

    let Some(trace_id) = captures.get(1) else {
        return TraceHeader::default();
    };

    TraceHeader {
        trace: Some(format!(
            "projects/{project_id}/traces/{}",
            trace_id.as_str()
        )),
        span_id: captures.get(2).map(|m| m.as_str().to_string()),
        sampled: captures.get(3).is_some_and(|m| m.as_str() == "1"),
    }
}
