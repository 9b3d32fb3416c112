//! Error handling for the Pulse observer engine
//!
//! The engine is observability infrastructure and must not destabilize its
//! host: collection failures are logged and omitted rather than raised, so
//! the error surface here is intentionally small.

use thiserror::Error;

/// The main error type for the observer engine
#[derive(Error, Debug)]
pub enum ObserverError {
    /// Invalid configuration value
    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    /// A background worker did not shut down within the bounded timeout
    #[error("{component} worker did not stop within {timeout_secs}s")]
    ShutdownTimeout {
        component: &'static str,
        timeout_secs: u64,
    },

    /// Summary serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for observer operations
pub type Result<T> = std::result::Result<T, ObserverError>;
