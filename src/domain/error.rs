use crate::engine::project::ProjectIdError;
use crate::sink::SinkError;
use thiserror::Error;

/// Failure of a single write through the engine.
///
/// This is what `write_log`/`write_request_log` propagate to their caller and
/// what completion callbacks observe.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Project id error: {0}")]
    ProjectId(#[from] ProjectIdError),
}
