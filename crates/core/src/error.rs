//! Error types for the ChatBuffer domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external collaborator has its own error type; only input-shape and
//! configuration errors ever reach the caller of the engine.

use thiserror::Error;

/// The top-level error type for ChatBuffer operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Input validation ---
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    // --- Backing store ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- ML classifier ---
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Collaborator errors ---

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Corrupt buffer payload for {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum ClassifierError {
    #[error("ML service unavailable: {0}")]
    Unavailable(String),

    #[error("ML service timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("ML service returned an invalid response: {0}")]
    InvalidResponse(String),
}
