use imds_state::StateError;
use thiserror::Error;

/// Failures while bootstrapping or running the server.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to prepare metadata document: {0}")]
    State(#[from] StateError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
