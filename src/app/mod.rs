pub mod config;
pub mod logging_system;

pub use config::{Config, ConfigError, LogLevel};
pub use logging_system::setup_logging;

use crate::engine::Engine;
use crate::transport::{self, TransportSummary};
use anyhow::Context;
use tokio::io::BufReader;
use tracing::{error, info};

/// Ships newline-delimited JSON records from stdin.
pub struct App {
    config: Config,
    engine: Engine,
}

impl App {
    pub fn from_args<I, T>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args(args).context("Invalid configuration")?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        config.validate()?;
        let engine_config = config.engine_config()?;
        let engine = Engine::new(engine_config).context("Failed to open log sink")?;

        info!(
            log_name = %config.log_name,
            stdout = config.use_stdout,
            "Starting rask-cloud-logging v{}",
            env!("CARGO_PKG_VERSION")
        );

        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub async fn run(self) -> anyhow::Result<TransportSummary> {
        let records = transport::ndjson_records(BufReader::new(tokio::io::stdin()));
        let summary = transport::pump(&self.engine, records).await;

        info!(
            delivered = summary.delivered,
            failed = summary.failed,
            "Input closed"
        );
        Ok(summary)
    }
}

// Main entry point for the application
pub async fn main() -> anyhow::Result<()> {
    let config = Config::from_args(std::env::args_os()).context("Invalid configuration")?;
    setup_logging(config.log_level);

    let app = match App::from_config(config) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Startup failed");
            return Err(e);
        }
    };

    let summary = app.run().await?;
    if summary.failed > 0 {
        error!(
            failed = summary.failed,
            total = summary.total(),
            "Some records were not delivered"
        );
    }
    Ok(())
}
