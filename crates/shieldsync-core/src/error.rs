//! Error types for the synchronizer
//!
//! Only two kinds abort a reconciliation pass: [`Error::Config`] (raised
//! before any network call) and [`Error::Source`] (the upstream listing
//! failed, so there is nothing to reconcile). Every other kind is caught at
//! the per-target boundary and recorded as a failed outcome for that target
//! alone.

use thiserror::Error;

/// Result type alias for synchronizer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the synchronizer
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (fatal, detected before reconciliation starts)
    #[error("configuration error: {0}")]
    Config(String),

    /// The upstream map source could not be listed (fatal for the run)
    #[error("map source error: {0}")]
    Source(String),

    /// A CIDR string could not be parsed, or carries non-zero host bits
    #[error("invalid CIDR: {0}")]
    Cidr(String),

    /// The downstream target no longer exists
    #[error("target not found: {0}")]
    NotFound(String),

    /// More than one resource matched a lookup that must be unique
    #[error("ambiguous target lookup: {0}")]
    Ambiguous(String),

    /// Applying the diff would exceed the target's entry capacity
    #[error("capacity exceeded: {required} entries required, {max} allowed")]
    CapacityExceeded {
        /// Projected entry count after the update
        required: usize,
        /// Maximum entries the target allows
        max: usize,
    },

    /// The target was modified concurrently (optimistic-concurrency loss)
    #[error("concurrent modification: {0}")]
    Conflict(String),

    /// Generic transport/auth failure from a target API
    #[error("API call failed ({target}): {message}")]
    Api {
        /// Target identifier the call was issued against
        target: String,
        /// Underlying failure message
        message: String,
    },

    /// Acknowledging a map upstream failed
    #[error("acknowledge failed: {0}")]
    Acknowledge(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a map source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a CIDR parse error
    pub fn cidr(msg: impl Into<String>) -> Self {
        Self::Cidr(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an ambiguous-lookup error
    pub fn ambiguous(msg: impl Into<String>) -> Self {
        Self::Ambiguous(msg.into())
    }

    /// Create a concurrent-modification error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a target API error
    pub fn api(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create an acknowledge error
    pub fn acknowledge(msg: impl Into<String>) -> Self {
        Self::Acknowledge(msg.into())
    }

    /// Whether this error aborts the whole pass rather than a single target
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Source(_))
    }
}

/// Helper for converting anyhow::Error at the binary boundary
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Config(err.to_string())
    }
}
