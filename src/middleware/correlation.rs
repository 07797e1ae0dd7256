use super::environment::ManagedEnvironment;
use super::request::RequestSnapshot;
use crate::domain::EngineError;
use crate::domain::record::{SPAN_ID_KEY, TRACE_KEY, TRACE_SAMPLED_KEY};
use crate::engine::{Engine, EngineConfig};
use crate::logger::Logger;
use crate::trace::{TRACE_CONTEXT_HEADER, TraceContext, generate_span_id, generate_trace, parse_trace_header};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, Span, error};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationConfig {
    pub project_id: Option<String>,
    pub emit_request_logs: bool,
    pub managed_environment: Option<ManagedEnvironment>,
}

impl CorrelationConfig {
    /// Request logs on, managed environment detected from the process.
    pub fn new(project_id: Option<String>) -> Self {
        Self {
            project_id: project_id.filter(|id| !id.is_empty()),
            emit_request_logs: true,
            managed_environment: ManagedEnvironment::detect(),
        }
    }

    #[must_use]
    pub fn with_managed_environment(mut self, environment: Option<ManagedEnvironment>) -> Self {
        self.managed_environment = environment;
        self
    }

    #[must_use]
    pub fn with_request_logs(mut self, enabled: bool) -> Self {
        self.emit_request_logs = enabled;
        self
    }
}

/// Shared state of the [`correlate`] middleware.
#[derive(Clone)]
pub struct CorrelationState {
    config: Arc<CorrelationConfig>,
    logger: Logger,
    request_engine: Arc<Engine>,
}

impl CorrelationState {
    /// `request_engine` must not share a sink or stream with `logger`'s engine.
    pub fn new(config: CorrelationConfig, logger: Logger, request_engine: Arc<Engine>) -> Self {
        Self {
            config: Arc::new(config),
            logger,
            request_engine,
        }
    }

    /// Opens the request-summary engine on `{log_name}_reqlog` of `engine_config`.
    pub fn from_engine_config(
        config: CorrelationConfig,
        logger: Logger,
        engine_config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        let request_engine = Engine::new(engine_config.request_log_config())?;
        Ok(Self::new(config, logger, Arc::new(request_engine)))
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// Trace context for a request carrying `header`. The span id is always set.
    pub fn acquire_context(&self, header: Option<&str>) -> TraceContext {
        let mut context = match (self.config.project_id.as_deref(), header) {
            (Some(project_id), Some(header)) => {
                let parsed = TraceContext::from(parse_trace_header(header, project_id));
                if parsed.is_established() {
                    parsed
                } else {
                    synthesized(project_id)
                }
            }
            (Some(project_id), None) => synthesized(project_id),
            (None, _) => TraceContext::default(),
        };

        if context.span_id.is_none() {
            context.span_id = Some(generate_span_id());
        }
        context
    }

    /// Child logger carrying the correlation fields, or the parent logger
    /// when no trace could be established.
    pub fn bind_logger(&self, context: &TraceContext) -> Logger {
        let Some(trace) = &context.trace else {
            return self.logger.clone();
        };

        let mut bindings = Map::new();
        bindings.insert(TRACE_KEY.to_string(), Value::String(trace.clone()));
        if let Some(span_id) = &context.span_id {
            bindings.insert(SPAN_ID_KEY.to_string(), Value::String(span_id.clone()));
        }
        if let Some(sampled) = context.sampled {
            bindings.insert(TRACE_SAMPLED_KEY.to_string(), Value::Bool(sampled));
        }
        self.logger.child(bindings)
    }

    pub fn should_emit_request_log(&self, context: &TraceContext) -> bool {
        self.config.emit_request_logs
            && self.config.managed_environment.is_none()
            && context.is_established()
    }
}

impl std::fmt::Debug for CorrelationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn synthesized(project_id: &str) -> TraceContext {
    TraceContext {
        trace: Some(generate_trace(project_id)),
        span_id: None,
        sampled: None,
    }
}

/// The correlated logger of the current request.
#[derive(Debug, Clone)]
pub struct RequestLogger(pub Logger);

impl<S> FromRequestParts<S> for RequestLogger
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<RequestLogger>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "correlation middleware is not installed",
        ))
    }
}

/// Correlates one request: binds a logger to its trace and, once the
/// response is ready, writes the request summary in the background.
pub async fn correlate(
    State(state): State<CorrelationState>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();

    let header = request
        .headers()
        .get(TRACE_CONTEXT_HEADER)
        .and_then(|value| value.to_str().ok());
    let context = state.acquire_context(header);

    let logger = state.bind_logger(&context);
    request.extensions_mut().insert(RequestLogger(logger));
    request.extensions_mut().insert(context.clone());

    if !state.should_emit_request_log(&context) {
        return next.run(request).await;
    }

    let snapshot = RequestSnapshot::capture(&request);
    let response = next.run(request).await;

    let http_request = snapshot.finish(&response);
    let latency = started.elapsed();
    let engine = Arc::clone(&state.request_engine);
    tokio::spawn(
        async move {
            if let Err(e) = engine
                .write_request_log(http_request, &context, Some(latency))
                .await
            {
                error!(error = %e, "Failed to write request log");
            }
        }
        .instrument(Span::current()),
    );

    response
}
