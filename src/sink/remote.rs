use super::credentials::{Credentials, TokenProvider};
use super::governance::{self, DEFAULT_MAX_ENTRY_SIZE};
use super::{AsyncSink, SinkError, WriteFuture};
use crate::domain::LogEntry;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_ENDPOINT: &str = "https://logging.googleapis.com";

/// The monitored resource entries are attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl Default for MonitoredResource {
    fn default() -> Self {
        Self {
            resource_type: "global".to_string(),
            labels: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub api_endpoint: String,
    pub log_name: String,
    pub resource: MonitoredResource,
    pub max_entry_size: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            log_name: "pino_log".to_string(),
            resource: MonitoredResource::default(),
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
            timeout: Duration::from_secs(30),
            user_agent: format!("rask-cloud-logging/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteRequest<'a> {
    log_name: String,
    resource: &'a MonitoredResource,
    entries: [LogEntry; 1],
}

/// Writes entries one at a time through `entries:write`.
///
/// Oversized entries are cut down before sending; see [`governance::fit_entry`].
pub struct CloudLoggingClient {
    client: Client,
    config: RemoteConfig,
    write_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl CloudLoggingClient {
    pub fn new(config: RemoteConfig, credentials: &Credentials) -> Result<Self, SinkError> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()?;
        let tokens = credentials.token_provider(&client)?;
        Ok(Self::with_token_provider(config, client, tokens))
    }

    pub fn with_token_provider(
        config: RemoteConfig,
        client: Client,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let write_url = format!(
            "{}/v2/entries:write",
            config.api_endpoint.trim_end_matches('/')
        );
        Self {
            client,
            config,
            write_url,
            tokens,
        }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Full resource name of the log, with the log id escaped.
    pub fn log_resource_name(&self, project_id: &str) -> String {
        format!(
            "projects/{project_id}/logs/{}",
            self.config.log_name.replace('/', "%2F")
        )
    }

    async fn send(&self, project_id: &str, entry: LogEntry) -> Result<(), SinkError> {
        let entry = governance::fit_entry(entry, self.config.max_entry_size)?;
        let token = self.tokens.access_token().await?;

        let request = WriteRequest {
            log_name: self.log_resource_name(project_id),
            resource: &self.config.resource,
            entries: [entry],
        };

        let response = self
            .client
            .post(&self.write_url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Http {
                status: status.as_u16(),
                body,
            });
        }

        debug!(log_name = %request.log_name, "Wrote log entry");
        Ok(())
    }
}

impl AsyncSink for CloudLoggingClient {
    fn write_entry<'a>(&'a self, project_id: &'a str, entry: LogEntry) -> WriteFuture<'a> {
        Box::pin(self.send(project_id, entry))
    }
}

impl std::fmt::Debug for CloudLoggingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudLoggingClient")
            .field("config", &self.config)
            .field("write_url", &self.write_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_resource_name_escapes_slashes() {
        let config = RemoteConfig {
            log_name: "app/requests".to_string(),
            ..Default::default()
        };
        let client = CloudLoggingClient::new(config, &Credentials::AccessToken("t".into())).unwrap();
        assert_eq!(
            client.log_resource_name("proj"),
            "projects/proj/logs/app%2Frequests"
        );
    }

    #[test]
    fn test_write_url_from_endpoint() {
        let config = RemoteConfig {
            api_endpoint: "http://localhost:8085/".to_string(),
            ..Default::default()
        };
        let client = CloudLoggingClient::new(config, &Credentials::AccessToken("t".into())).unwrap();
        assert_eq!(client.write_url, "http://localhost:8085/v2/entries:write");
    }

    #[test]
    fn test_client_build_failure_is_a_network_error() {
        let config = RemoteConfig {
            user_agent: "bad\nagent".to_string(),
            ..Default::default()
        };
        let err = CloudLoggingClient::new(config, &Credentials::AccessToken("t".into())).unwrap_err();
        assert!(matches!(err, SinkError::Network(_)));
    }

    #[test]
    fn test_default_resource_is_global() {
        let value = serde_json::to_value(MonitoredResource::default()).unwrap();
        assert_eq!(value, serde_json::json!({"type": "global"}));
    }
}
