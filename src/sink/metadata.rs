use super::credentials::CredentialsError;
use reqwest::Client;
use std::time::Duration;

pub const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";
const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

/// Client for the compute metadata server.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    client: Client,
    base_url: String,
}

impl MetadataClient {
    /// Targets `GCE_METADATA_HOST` when set, the well-known host otherwise.
    pub fn from_env(client: Client) -> Self {
        let host = std::env::var(METADATA_HOST_ENV)
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string());
        Self::new(client, format!("http://{host}"))
    }

    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches `/computeMetadata/v1/{path}` as text.
    pub async fn get(&self, path: &str) -> Result<String, CredentialsError> {
        let url = format!("{}/computeMetadata/v1/{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_secs(3))
            .send()
            .await
            .map_err(|e| CredentialsError::Metadata(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CredentialsError::Metadata(format!(
                "{url}: HTTP {}",
                status.as_u16()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| CredentialsError::Metadata(format!("{url}: {e}")))
    }
}
