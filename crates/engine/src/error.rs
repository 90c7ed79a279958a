//! Engine error types.

use chatbuffer_core::{ClassifierError, StoreError};
use chatbuffer_semantic::PatternError;
use thiserror::Error;

/// Buffer operations that did not complete.
#[derive(Debug, Clone, Error)]
pub enum BufferError {
    /// The store circuit is open or the store call failed or timed out.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A cancel issued after this append started took effect first.
    #[error("Append cancelled")]
    Cancelled,
}

/// Failures while assembling an engine from configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid engine configuration: {0}")]
    Config(String),
}
