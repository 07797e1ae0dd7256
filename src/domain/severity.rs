use serde::{Deserialize, Serialize};

/// Cloud Logging severity of an entry.
///
/// This is distinct from the numeric level codes carried by application records.
/// `Severity::from_level` folds any level code into one of the five buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Default,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Maps a level code onto a severity, highest threshold first.
    ///
    /// Custom levels between the canonical ones fall through to the nearest
    /// lower threshold, so 45 is a warning and 1000 is critical.
    pub fn from_level(level: i64) -> Self {
        match level {
            l if l >= 60 => Severity::Critical,
            l if l >= 50 => Severity::Error,
            l if l >= 40 => Severity::Warning,
            l if l >= 30 => Severity::Info,
            _ => Severity::Debug,
        }
    }

    /// True for severities Error Reporting picks up.
    pub fn is_reportable(self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
