use crate::sink::credentials::ServiceAccountKey;
use crate::sink::metadata::MetadataClient;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

/// Environment variables consulted for the project id, in order.
pub const PROJECT_ENV_VARS: [&str; 3] = ["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT", "GCP_PROJECT"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectIdError {
    #[error("Unable to detect a project id: {last}")]
    NotFound { last: String },
}

pub type DiscoveryFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, ProjectIdError>> + Send + 'a>>;

/// Finds the project id when none was configured.
pub trait ProjectDiscovery: Send + Sync {
    fn discover(&self) -> DiscoveryFuture<'_>;
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment, then key file, then the metadata server.
pub struct DefaultProjectDiscovery {
    key_file: Option<PathBuf>,
    metadata: MetadataClient,
    env: EnvLookup,
}

impl DefaultProjectDiscovery {
    pub fn new(key_file: Option<PathBuf>, metadata: MetadataClient) -> Self {
        Self {
            key_file,
            metadata,
            env: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    fn env_project_id(&self) -> Option<String> {
        PROJECT_ENV_VARS
            .iter()
            .find_map(|name| (self.env)(name).filter(|v| !v.is_empty()))
    }

    fn key_file_project_id(&self) -> Option<String> {
        let path = self.key_file.as_ref()?;
        match ServiceAccountKey::from_file(path) {
            Ok(key) => key.project_id.filter(|id| !id.is_empty()),
            Err(e) => {
                debug!(error = %e, "Key file gave no project id");
                None
            }
        }
    }

    async fn run(&self) -> Result<String, ProjectIdError> {
        if let Some(project_id) = self.env_project_id() {
            return Ok(project_id);
        }
        if let Some(project_id) = self.key_file_project_id() {
            return Ok(project_id);
        }

        let body = self
            .metadata
            .get("project/project-id")
            .await
            .map_err(|e| ProjectIdError::NotFound {
                last: e.to_string(),
            })?;
        let project_id = body.trim();
        if project_id.is_empty() {
            return Err(ProjectIdError::NotFound {
                last: "metadata server returned an empty project id".to_string(),
            });
        }
        Ok(project_id.to_string())
    }
}

impl ProjectDiscovery for DefaultProjectDiscovery {
    fn discover(&self) -> DiscoveryFuture<'_> {
        Box::pin(self.run())
    }
}

/// Configured project id, or the first successful discovery.
///
/// Failed discoveries are not cached; the next call tries again.
pub struct ProjectIdResolver {
    configured: Option<String>,
    discovered: OnceCell<String>,
    discovery: Arc<dyn ProjectDiscovery>,
}

impl ProjectIdResolver {
    pub fn new(configured: Option<String>, discovery: Arc<dyn ProjectDiscovery>) -> Self {
        Self {
            configured: configured.filter(|id| !id.is_empty()),
            discovered: OnceCell::new(),
            discovery,
        }
    }

    /// The project id if known without suspending.
    pub fn known(&self) -> Option<&str> {
        self.configured
            .as_deref()
            .or_else(|| self.discovered.get().map(String::as_str))
    }

    pub async fn resolve(&self) -> Result<String, ProjectIdError> {
        if let Some(project_id) = self.known() {
            return Ok(project_id.to_string());
        }
        let project_id = self
            .discovered
            .get_or_try_init(|| self.discovery.discover())
            .await?;
        debug!(project_id = %project_id, "Discovered project id");
        Ok(project_id.clone())
    }
}

impl std::fmt::Debug for ProjectIdResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectIdResolver")
            .field("configured", &self.configured)
            .field("discovered", &self.discovered.get())
            .finish_non_exhaustive()
    }
}
