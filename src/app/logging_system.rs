use super::config::LogLevel;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const NOISY_TARGETS: [&str; 4] = ["hyper", "reqwest", "h2", "rustls"];

static INIT: OnceLock<bool> = OnceLock::new();

/// Filter used when `RUST_LOG` is not set: the configured level, with the
/// HTTP stack held at warn.
pub fn build_filter_string(level: LogLevel) -> String {
    let mut parts = vec![level.as_str().to_string()];
    parts.extend(NOISY_TARGETS.iter().map(|target| format!("{target}=warn")));
    parts.join(",")
}

/// Installs the global subscriber once. Diagnostics always go to stderr so
/// they never mix with entries written to stdout.
///
/// Returns whether this call installed it.
pub fn setup_logging(level: LogLevel) -> bool {
    *INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(build_filter_string(level)));
        let use_json = std::env::var("RUST_LOG_FORMAT").is_ok_and(|v| v == "json");

        let result = if use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_current_span(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_level(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()
        };

        if let Err(e) = &result {
            eprintln!("Warning: tracing already initialized: {e}");
        }
        result.is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_string() {
        let filter = build_filter_string(LogLevel::Debug);
        assert!(filter.starts_with("debug,"));
        assert!(filter.contains("hyper=warn"));
        assert!(filter.contains("reqwest=warn"));
        assert!(EnvFilter::try_new(&filter).is_ok());
    }

    #[test]
    fn test_setup_logging_is_idempotent() {
        let first = setup_logging(LogLevel::Info);
        assert_eq!(setup_logging(LogLevel::Trace), first);
    }
}
