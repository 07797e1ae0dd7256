use super::metadata::MetadataClient;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

pub const LOGGING_WRITE_SCOPE: &str = "https://www.googleapis.com/auth/logging.write";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
// Refresh this long before the platform would reject the token.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Failed to read key file {path}: {source}")]
    KeyFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid key file {path}: {source}")]
    KeyFileParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("Token endpoint error: {0}")]
    TokenEndpoint(String),
    #[error("Metadata server error: {0}")]
    Metadata(String),
}

/// Where the remote sink gets its bearer tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    /// The default service account of the compute environment.
    #[default]
    MetadataServer,
    /// A token minted elsewhere and used as-is.
    AccessToken(String),
    /// A service-account JSON key file.
    KeyFile(PathBuf),
}

impl Credentials {
    pub fn token_provider(&self, client: &Client) -> Result<Arc<dyn TokenProvider>, CredentialsError> {
        Ok(match self {
            Credentials::MetadataServer => Arc::new(MetadataServerCredentials::new(
                MetadataClient::from_env(client.clone()),
            )),
            Credentials::AccessToken(token) => Arc::new(StaticToken::new(token.clone())),
            Credentials::KeyFile(path) => Arc::new(ServiceAccountCredentials::new(
                ServiceAccountKey::from_file(path)?,
                client.clone(),
            )),
        })
    }

    pub fn key_file(&self) -> Option<&Path> {
        match self {
            Credentials::KeyFile(path) => Some(path),
            _ => None,
        }
    }
}

pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<String, CredentialsError>> + Send + 'a>>;

/// Supplies OAuth bearer tokens for the logging API.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> TokenFuture<'_>;
}

#[derive(Debug, Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenProvider for StaticToken {
    fn access_token(&self) -> TokenFuture<'_> {
        let token = self.token.clone();
        Box::pin(async move { Ok(token) })
    }
}

/// The fields of a service-account key file this crate uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        let content = std::fs::read_to_string(path).map_err(|source| CredentialsError::KeyFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| CredentialsError::KeyFileParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

#[derive(Default)]
struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<String, CredentialsError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TokenResponse, CredentialsError>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.refresh_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        let response = fetch().await?;
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(EXPIRY_MARGIN);
        *slot = Some(CachedToken {
            token: response.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(response.access_token)
    }
}

/// Exchanges a signed RS256 assertion for an access token.
pub struct ServiceAccountCredentials {
    key: ServiceAccountKey,
    client: Client,
    cache: TokenCache,
}

impl ServiceAccountCredentials {
    pub fn new(key: ServiceAccountKey, client: Client) -> Self {
        Self {
            key,
            client,
            cache: TokenCache::default(),
        }
    }

    fn assertion(&self) -> Result<String, CredentialsError> {
        let iat = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: LOGGING_WRITE_SCOPE,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &signing_key)?)
    }

    async fn fetch(&self) -> Result<TokenResponse, CredentialsError> {
        let assertion = self.assertion()?;
        debug!(client_email = %self.key.client_email, "Requesting service account token");

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| CredentialsError::TokenEndpoint(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialsError::TokenEndpoint(format!(
                "HTTP {}: {body}",
                status.as_u16()
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| CredentialsError::TokenEndpoint(e.to_string()))
    }
}

impl TokenProvider for ServiceAccountCredentials {
    fn access_token(&self) -> TokenFuture<'_> {
        Box::pin(self.cache.get_or_fetch(|| self.fetch()))
    }
}

/// Uses the default service account of the compute environment.
pub struct MetadataServerCredentials {
    metadata: MetadataClient,
    cache: TokenCache,
}

impl MetadataServerCredentials {
    pub fn new(metadata: MetadataClient) -> Self {
        Self {
            metadata,
            cache: TokenCache::default(),
        }
    }

    async fn fetch(&self) -> Result<TokenResponse, CredentialsError> {
        let body = self
            .metadata
            .get("instance/service-accounts/default/token")
            .await?;
        serde_json::from_str(&body).map_err(|e| CredentialsError::Metadata(e.to_string()))
    }
}

impl TokenProvider for MetadataServerCredentials {
    fn access_token(&self) -> TokenFuture<'_> {
        Box::pin(self.cache.get_or_fetch(|| self.fetch()))
    }
}
