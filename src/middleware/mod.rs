//! Request correlation for axum services.
//!
//! Install [`correlate`] with `axum::middleware::from_fn_with_state` and pull
//! the per-request [`RequestLogger`] out of handlers.

pub mod correlation;
pub mod environment;
pub mod request;

pub use correlation::{CorrelationConfig, CorrelationState, RequestLogger, correlate};
pub use environment::ManagedEnvironment;
pub use request::RequestSnapshot;
