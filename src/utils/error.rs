//! Error Handling
//!
//! Unified error types for the engine.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum EngineError {
    /// No usable input supplied; rejected before any remote call is made
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A second run was attempted while one is still in flight
    #[error("A run is already in flight: {0}")]
    AlreadyRunning(String),

    /// A specific phase's remote call failed (network, non-2xx, malformed
    /// payload, or cancellation); scoped to one phase
    #[error("Remote call failed for phase '{phase}': {message}")]
    RemoteCall { phase: String, message: String },

    /// Archive namespace was unreadable; handled locally by wiping it
    #[error("Storage corruption: {0}")]
    StorageCorruption(String),

    /// Storage quota exceeded even after pruning and one retry
    #[error("Storage quota exceeded: {0}")]
    StorageQuota(String),

    /// The durable medium rejected an operation for a non-quota reason
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation errors (bad state transition, unknown phase key, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for engine errors
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Create an invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an already-running error
    pub fn already_running(msg: impl Into<String>) -> Self {
        Self::AlreadyRunning(msg.into())
    }

    /// Create a remote-call error scoped to one phase
    pub fn remote_call(phase: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::RemoteCall {
            phase: phase.into(),
            message: msg.into(),
        }
    }

    /// Create a storage-corruption error
    pub fn storage_corruption(msg: impl Into<String>) -> Self {
        Self::StorageCorruption(msg.into())
    }

    /// Create a storage-quota error
    pub fn storage_quota(msg: impl Into<String>) -> Self {
        Self::StorageQuota(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert EngineError to a string suitable for host-facing responses
impl From<EngineError> for String {
    fn from(err: EngineError) -> String {
        err.to_string()
    }
}
