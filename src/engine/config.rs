use crate::domain::EngineError;
use crate::sink::governance::DEFAULT_MAX_ENTRY_SIZE;
use crate::sink::remote::DEFAULT_API_ENDPOINT;
use crate::sink::{Credentials, MonitoredResource, RemoteConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_LOG_NAME: &str = "pino_log";
const REQUEST_LOG_SUFFIX: &str = "_reqlog";

/// Called once per write with `None` on success or the failure.
pub type CompletionCallback = Arc<dyn Fn(Option<&EngineError>) + Send + Sync>;

/// Identifies the service to error reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceContext {
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ServiceContext {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version: None,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Immutable settings of one [`Engine`](super::Engine).
#[derive(Clone)]
pub struct EngineConfig {
    pub log_name: String,
    pub project_id: Option<String>,
    pub credentials: Credentials,
    pub resource: MonitoredResource,
    pub service_context: Option<ServiceContext>,
    pub labels: BTreeMap<String, String>,
    pub prefix: Option<String>,
    pub use_stdout: bool,
    pub use_message_field: bool,
    pub max_entry_size: usize,
    pub api_endpoint: String,
    pub default_callback: Option<CompletionCallback>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_name: DEFAULT_LOG_NAME.to_string(),
            project_id: None,
            credentials: Credentials::default(),
            resource: MonitoredResource::default(),
            service_context: None,
            labels: BTreeMap::new(),
            prefix: None,
            use_stdout: false,
            use_message_field: true,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            default_callback: None,
        }
    }
}

impl EngineConfig {
    pub fn stdout() -> Self {
        Self {
            use_stdout: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_default_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<&EngineError>) + Send + Sync + 'static,
    {
        self.default_callback = Some(Arc::new(callback));
        self
    }

    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig {
            api_endpoint: self.api_endpoint.clone(),
            log_name: self.log_name.clone(),
            resource: self.resource.clone(),
            max_entry_size: self.max_entry_size,
            ..RemoteConfig::default()
        }
    }

    /// Settings for the engine that writes request summaries: same
    /// destination, its own log stream, no completion callback.
    pub fn request_log_config(&self) -> Self {
        Self {
            log_name: format!("{}{REQUEST_LOG_SUFFIX}", self.log_name),
            default_callback: None,
            ..self.clone()
        }
    }

    /// The prefix, if it is non-empty.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref().filter(|p| !p.is_empty())
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("log_name", &self.log_name)
            .field("project_id", &self.project_id)
            .field("resource", &self.resource)
            .field("service_context", &self.service_context)
            .field("labels", &self.labels)
            .field("prefix", &self.prefix)
            .field("use_stdout", &self.use_stdout)
            .field("use_message_field", &self.use_message_field)
            .field("max_entry_size", &self.max_entry_size)
            .field("api_endpoint", &self.api_endpoint)
            .field("default_callback", &self.default_callback.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.log_name, "pino_log");
        assert!(config.use_message_field);
        assert!(!config.use_stdout);
        assert_eq!(config.max_entry_size, 250_000);
        assert_eq!(config.resource.resource_type, "global");
    }

    #[test]
    fn test_request_log_config_uses_own_stream() {
        let config = EngineConfig {
            log_name: "app".to_string(),
            ..EngineConfig::stdout()
        }
        .with_default_callback(|_| {});

        let request = config.request_log_config();
        assert_eq!(request.log_name, "app_reqlog");
        assert!(request.use_stdout);
        assert!(request.default_callback.is_none());
    }

    #[test]
    fn test_empty_prefix_is_none() {
        let config = EngineConfig {
            prefix: Some(String::new()),
            ..EngineConfig::default()
        };
        assert_eq!(config.prefix(), None);
    }

    #[test]
    fn test_service_context_serialization() {
        let ctx = ServiceContext::new("api").with_version("1.2.0");
        assert_eq!(
            serde_json::to_value(&ctx).unwrap(),
            serde_json::json!({"service": "api", "version": "1.2.0"})
        );
        assert_eq!(
            serde_json::to_value(ServiceContext::new("api")).unwrap(),
            serde_json::json!({"service": "api"})
        );
    }
}
