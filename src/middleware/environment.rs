/// A hosting platform whose own agent already writes request logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagedEnvironment {
    AppEngine,
    CloudRun,
    CloudFunctions,
    CloudRunJob,
}

impl ManagedEnvironment {
    pub const ALL: [ManagedEnvironment; 4] = [
        ManagedEnvironment::AppEngine,
        ManagedEnvironment::CloudRun,
        ManagedEnvironment::CloudFunctions,
        ManagedEnvironment::CloudRunJob,
    ];

    /// Environment variable the platform sets.
    pub fn marker(self) -> &'static str {
        match self {
            ManagedEnvironment::AppEngine => "GAE_SERVICE",
            ManagedEnvironment::CloudRun => "K_SERVICE",
            ManagedEnvironment::CloudFunctions => "FUNCTION_TARGET",
            ManagedEnvironment::CloudRunJob => "CLOUD_RUN_JOB",
        }
    }

    pub fn detect() -> Option<Self> {
        Self::detect_with(|name| std::env::var(name).ok())
    }

    /// First platform whose marker `lookup` reports as set and non-empty.
    pub fn detect_with<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::ALL
            .into_iter()
            .find(|env| lookup(env.marker()).is_some_and(|value| !value.is_empty()))
    }
}
