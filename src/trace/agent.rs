use opentelemetry::trace::TraceContextExt;
use std::sync::Arc;

/// Read-only view of a process-wide tracing agent.
///
/// The agent may not be installed at all, which is the common case; every
/// accessor then returns `None`.
pub trait TraceAgent: Send + Sync {
    /// Id of the trace active on the current task.
    fn context_id(&self) -> Option<String>;

    /// Project the agent writes its traces to.
    fn writer_project_id(&self) -> Option<String>;

    /// Trace context of the active root span, `{traceId}/{spanId};o={flag}`.
    fn root_span_trace_context(&self) -> Option<String>;
}

/// Stands in when no agent is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTraceAgent;

impl TraceAgent for NoopTraceAgent {
    fn context_id(&self) -> Option<String> {
        None
    }

    fn writer_project_id(&self) -> Option<String> {
        None
    }

    fn root_span_trace_context(&self) -> Option<String> {
        None
    }
}

/// Reads the current OpenTelemetry context as the ambient agent.
///
/// Span ids are rendered as decimal integers, the form Cloud Trace expects.
#[derive(Debug, Default, Clone)]
pub struct OpenTelemetryAgent {
    project_id: Option<String>,
}

impl OpenTelemetryAgent {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
        }
    }
}

impl TraceAgent for OpenTelemetryAgent {
    fn context_id(&self) -> Option<String> {
        let cx = opentelemetry::Context::current();
        let span = cx.span();
        let span_context = span.span_context();
        span_context
            .is_valid()
            .then(|| span_context.trace_id().to_string())
    }

    fn writer_project_id(&self) -> Option<String> {
        self.project_id.clone()
    }

    fn root_span_trace_context(&self) -> Option<String> {
        let cx = opentelemetry::Context::current();
        let span = cx.span();
        let span_context = span.span_context();
        if !span_context.is_valid() {
            return None;
        }
        let span_id = u64::from_str_radix(&span_context.span_id().to_string(), 16).ok()?;
        Some(format!(
            "{}/{};o={}",
            span_context.trace_id(),
            span_id,
            u8::from(span_context.is_sampled())
        ))
    }
}

/// Trace and span lookups against the installed agent, if any.
///
/// Reads are never cached: the agent's state changes from request to request.
#[derive(Clone)]
pub struct TraceAgentBridge {
    agent: Arc<dyn TraceAgent>,
}

impl TraceAgentBridge {
    pub fn new(agent: Arc<dyn TraceAgent>) -> Self {
        Self { agent }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopTraceAgent))
    }

    /// `projects/{project}/traces/{id}` when the agent knows both parts.
    pub fn current_trace(&self) -> Option<String> {
        let trace_id = self.agent.context_id().filter(|id| !id.is_empty())?;
        let project_id = self
            .agent
            .writer_project_id()
            .filter(|id| !id.is_empty())?;
        Some(format!("projects/{project_id}/traces/{trace_id}"))
    }

    pub fn current_span(&self) -> Option<String> {
        let context = self.agent.root_span_trace_context()?;
        let segment = context.split('/').nth(1)?;
        let span_id = segment.split(';').next().unwrap_or_default();
        (!span_id.is_empty()).then(|| span_id.to_string())
    }
}

impl Default for TraceAgentBridge {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for TraceAgentBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceAgentBridge").finish_non_exhaustive()
    }
}
