use super::header::TraceHeader;
use rand::Rng;
use uuid::Uuid;

/// Trace correlation for one request or one log call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceContext {
    pub trace: Option<String>,
    pub span_id: Option<String>,
    pub sampled: Option<bool>,
}

impl TraceContext {
    pub fn is_established(&self) -> bool {
        self.trace.is_some()
    }
}

impl From<TraceHeader> for TraceContext {
    fn from(header: TraceHeader) -> Self {
        let sampled = header.trace.as_ref().map(|_| header.sampled);
        Self {
            trace: header.trace,
            span_id: header.span_id,
            sampled,
        }
    }
}

/// A fresh trace resource name, unrelated to any inbound trace.
pub fn generate_trace(project_id: &str) -> String {
    format!("projects/{project_id}/traces/{}", Uuid::new_v4().simple())
}

/// A fresh span id: a non-zero 64-bit integer rendered in decimal.
pub fn generate_span_id() -> String {
    rand::rng().random_range(1..=u64::MAX).to_string()
}
