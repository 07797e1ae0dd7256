//! The entry transformation engine.
//!
//! An [`Engine`] owns one sink for its whole life and turns each
//! [`RawLogRecord`] into a [`LogEntry`] before writing it there.

pub mod config;
pub mod format;
pub mod project;

pub use config::{CompletionCallback, DEFAULT_LOG_NAME, EngineConfig, ServiceContext};
pub use project::{DefaultProjectDiscovery, ProjectDiscovery, ProjectIdError, ProjectIdResolver};

use crate::domain::entry::EntryMetadata;
use crate::domain::{EngineError, HttpRequest, Latency, LogEntry, RawLogRecord, Severity};
use crate::sink::metadata::MetadataClient;
use crate::sink::{CloudLoggingClient, Sink, SinkError};
use crate::trace::{TraceAgentBridge, TraceContext};
use chrono::{DateTime, TimeZone, Utc};
use format::HttpRequestField;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct Engine {
    config: EngineConfig,
    sink: Sink,
    trace_agent: TraceAgentBridge,
    project: ProjectIdResolver,
}

impl Engine {
    /// Opens the sink the configuration asks for. Never blocks; the project
    /// id is resolved on the first remote write.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let sink = if config.use_stdout {
            Sink::stdout()
        } else {
            let client = CloudLoggingClient::new(config.remote_config(), &config.credentials)?;
            Sink::Async(Arc::new(client))
        };
        Ok(Self::with_sink(config, sink))
    }

    /// Builds an engine around an already opened sink.
    pub fn with_sink(config: EngineConfig, sink: Sink) -> Self {
        let discovery = DefaultProjectDiscovery::new(
            config.credentials.key_file().map(ToOwned::to_owned),
            MetadataClient::from_env(reqwest::Client::new()),
        );
        let project = ProjectIdResolver::new(config.project_id.clone(), Arc::new(discovery));
        Self {
            config,
            sink,
            trace_agent: TraceAgentBridge::disabled(),
            project,
        }
    }

    #[must_use]
    pub fn with_trace_agent(mut self, trace_agent: TraceAgentBridge) -> Self {
        self.trace_agent = trace_agent;
        self
    }

    #[must_use]
    pub fn with_project_discovery(mut self, discovery: Arc<dyn ProjectDiscovery>) -> Self {
        self.project = ProjectIdResolver::new(self.config.project_id.clone(), discovery);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub async fn resolve_project_id(&self) -> Result<String, ProjectIdError> {
        self.project.resolve().await
    }

    pub fn severity_of(&self, record: &RawLogRecord) -> Severity {
        format::severity_of(record)
    }

    pub fn format_message(&self, record: &RawLogRecord) -> String {
        format::format_message(record, self.config.prefix())
    }

    pub fn extract_trace(&self, record: &RawLogRecord) -> TraceContext {
        format::extract_trace(record, &self.trace_agent)
    }

    pub fn build_metadata(&self, record: &RawLogRecord) -> Map<String, Value> {
        format::build_metadata(record)
    }

    /// The entry `write_log` would send for `record`.
    pub fn build_entry(&self, record: &RawLogRecord) -> Result<LogEntry, EngineError> {
        let severity = self.severity_of(record);
        let message = self.format_message(record);
        let trace = self.extract_trace(record);

        let mut payload = self.build_metadata(record);
        if self.config.use_message_field && !message.is_empty() {
            payload.insert(
                format::PAYLOAD_MESSAGE_KEY.to_string(),
                Value::String(message),
            );
        }

        let mut labels = self.config.labels.clone();
        labels.extend(record.labels());

        let mut metadata = EntryMetadata::new(severity, timestamp_of(record));
        metadata.labels = labels;
        metadata.trace = trace.trace;
        metadata.span_id = trace.span_id;
        metadata.trace_sampled = trace.sampled;

        match format::http_request_of(record) {
            HttpRequestField::Absent => {}
            HttpRequestField::Elevated(http_request) => metadata.http_request = Some(http_request),
            HttpRequestField::Malformed(value) => {
                debug!("httpRequest is not a request block, keeping it in the payload");
                format::keep_malformed_http_request(&mut payload, value);
            }
        }

        if let Some(service_context) = &self.config.service_context {
            let error = record.error();
            if format::is_error_report(Some(service_context), severity, error.as_ref()) {
                format::annotate_error_report(&mut payload, service_context)
                    .map_err(SinkError::from)?;
            }
        }

        Ok(LogEntry::new(metadata, payload))
    }

    /// Transforms and writes one record.
    ///
    /// Both `callback` and the configured default callback observe the
    /// outcome before a failure is returned.
    pub async fn write_log(
        &self,
        record: RawLogRecord,
        callback: Option<CompletionCallback>,
    ) -> Result<(), EngineError> {
        let result = match self.build_entry(&record) {
            Ok(entry) => self.dispatch(entry).await,
            Err(e) => Err(e),
        };

        let outcome = result.as_ref().err();
        if let Some(callback) = &callback {
            callback(outcome);
        }
        if let Some(callback) = &self.config.default_callback {
            callback(outcome);
        }

        result
    }

    /// Writes a request summary: INFO, empty body, request block and trace
    /// only.
    pub async fn write_request_log(
        &self,
        mut http_request: HttpRequest,
        trace: &TraceContext,
        latency: Option<Duration>,
    ) -> Result<(), EngineError> {
        if let Some(latency) = latency {
            http_request.latency = Some(Latency::from_duration(latency));
        }

        let mut metadata = EntryMetadata::new(Severity::Info, Utc::now());
        metadata.labels = self.config.labels.clone();
        metadata.trace = trace.trace.clone();
        metadata.span_id = trace.span_id.clone();
        metadata.trace_sampled = trace.sampled;
        metadata.http_request = Some(http_request);

        self.dispatch(LogEntry::new(metadata, Map::new())).await
    }

    async fn dispatch(&self, entry: LogEntry) -> Result<(), EngineError> {
        match &self.sink {
            Sink::Sync(sink) => sink.write_entry(&entry)?,
            Sink::Async(sink) => {
                let project_id = self.resolve_project_id().await?;
                sink.write_entry(&project_id, entry).await?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("sink", &self.sink)
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

fn timestamp_of(record: &RawLogRecord) -> DateTime<Utc> {
    record
        .time_millis()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .unwrap_or_else(Utc::now)
}
