use crate::engine::{EngineConfig, ServiceContext};
use crate::sink::{Credentials, MonitoredResource};
use crate::sink::governance::DEFAULT_MAX_ENTRY_SIZE;
use crate::sink::remote::DEFAULT_API_ENDPOINT;
use clap::{ArgAction, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Parser, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Log stream entries are written to
    #[arg(long, env = "LOG_NAME", default_value = "pino_log")]
    pub log_name: String,

    /// Project id (discovered from the environment if not provided)
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    pub project_id: Option<String>,

    /// Service-account key file
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub key_filename: Option<PathBuf>,

    /// Pre-minted OAuth access token
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Monitored resource type
    #[arg(long, env = "LOG_RESOURCE_TYPE", default_value = "global")]
    pub resource_type: String,

    /// Monitored resource label as key=value (repeatable)
    #[arg(long = "resource-label", action = ArgAction::Append)]
    pub resource_labels: Vec<String>,

    /// Service name reported to error reporting
    #[arg(long, env = "LOG_SERVICE")]
    pub service: Option<String>,

    /// Service version reported to error reporting
    #[arg(long, env = "LOG_SERVICE_VERSION")]
    pub service_version: Option<String>,

    /// Entry label as key=value (repeatable)
    #[arg(long = "label", action = ArgAction::Append)]
    pub labels: Vec<String>,

    /// Prefix prepended to every message as "[prefix] "
    #[arg(long, env = "LOG_PREFIX")]
    pub prefix: Option<String>,

    /// Write structured JSON lines to stdout instead of calling the API
    #[arg(long, env = "LOG_USE_STDOUT")]
    pub use_stdout: bool,

    /// Include the formatted message in the payload
    #[arg(
        long,
        env = "LOG_USE_MESSAGE_FIELD",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub use_message_field: bool,

    /// Largest serialized entry in bytes
    #[arg(long, env = "LOG_MAX_ENTRY_SIZE", default_value = "250000")]
    pub max_entry_size: usize,

    /// Logging API endpoint
    #[arg(
        long,
        env = "LOGGING_API_ENDPOINT",
        default_value = "https://logging.googleapis.com"
    )]
    pub api_endpoint: String,

    /// Level of this tool's own diagnostics
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_name: crate::engine::DEFAULT_LOG_NAME.to_string(),
            project_id: None,
            key_filename: None,
            access_token: None,
            resource_type: "global".to_string(),
            resource_labels: Vec::new(),
            service: None,
            service_version: None,
            labels: Vec::new(),
            prefix: None,
            use_stdout: false,
            use_message_field: true,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            log_level: LogLevel::Info,
            config_file: None,
        }
    }
}

impl Config {
    /// Parses arguments and environment. A `--config-file` replaces both.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::parse_from(args);
        if let Some(path) = &config.config_file {
            return Self::from_file(path);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "log_name must not be empty".to_string(),
            ));
        }
        if self.max_entry_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_entry_size must be greater than 0".to_string(),
            ));
        }
        Url::parse(&self.api_endpoint)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {e}", self.api_endpoint)))?;
        parse_key_values(&self.labels)?;
        parse_key_values(&self.resource_labels)?;
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        if let Some(token) = self.access_token.as_ref().filter(|t| !t.is_empty()) {
            Credentials::AccessToken(token.clone())
        } else if let Some(path) = &self.key_filename {
            Credentials::KeyFile(path.clone())
        } else {
            Credentials::MetadataServer
        }
    }

    pub fn service_context(&self) -> Option<ServiceContext> {
        let service = self.service.as_ref().filter(|s| !s.is_empty())?;
        Some(ServiceContext {
            service: service.clone(),
            version: self.service_version.clone().filter(|v| !v.is_empty()),
        })
    }

    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        Ok(EngineConfig {
            log_name: self.log_name.clone(),
            project_id: self.project_id.clone().filter(|id| !id.is_empty()),
            credentials: self.credentials(),
            resource: MonitoredResource {
                resource_type: self.resource_type.clone(),
                labels: parse_key_values(&self.resource_labels)?,
            },
            service_context: self.service_context(),
            labels: parse_key_values(&self.labels)?,
            prefix: self.prefix.clone(),
            use_stdout: self.use_stdout,
            use_message_field: self.use_message_field,
            max_entry_size: self.max_entry_size,
            api_endpoint: self.api_endpoint.clone(),
            default_callback: None,
        })
    }
}

/// Parses `key=value` pairs; later keys win.
pub fn parse_key_values(pairs: &[String]) -> Result<BTreeMap<String, String>, ConfigError> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(ConfigError::InvalidConfig(format!(
                "expected key=value, got '{pair}'"
            ))),
        })
        .collect()
}
