//! Trace correlation: the propagation header, the ambient trace agent and
//! fresh per-request context.

pub mod agent;
pub mod context;
pub mod header;

pub use agent::{NoopTraceAgent, OpenTelemetryAgent, TraceAgent, TraceAgentBridge};
pub use context::{TraceContext, generate_span_id, generate_trace};
pub use header::{TRACE_CONTEXT_HEADER, TraceHeader, parse_trace_header};
