//! Error types for hostname bucket management
//!
//! This module defines all error types used throughout the crate.
//! The batcher itself never fails; every variant here comes from
//! configuration, the upstream API, the apply engine or the state store.

use thiserror::Error;

/// Result type alias for hostname bucket operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for hostname bucket management
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A desired hostname record failed validation
    #[error("Invalid hostname {cname_from}: {reason}")]
    InvalidHostname {
        /// The offending cname-from
        cname_from: String,
        /// Why it was rejected
        reason: String,
    },

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Local I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Resource not found upstream
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// A hostname activation reached a failed terminal status
    #[error("Activation {activation_id} ended with status {status}")]
    Activation {
        /// Upstream activation id
        activation_id: String,
        /// The terminal status reported upstream
        status: String,
    },

    /// A hostname activation did not settle in time
    #[error("Timed out after {waited_secs}s waiting for activation {activation_id}")]
    ActivationTimeout {
        /// Upstream activation id
        activation_id: String,
        /// Seconds spent polling
        waited_secs: u64,
    },

    /// A batch failed to apply; later batches were not sent
    #[error("Batch {batch} of {total} failed: {source}")]
    Batch {
        /// 1-based index of the failed batch
        batch: usize,
        /// Number of batches in the plan
        total: usize,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// The apply was cancelled by a shutdown signal
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid hostname error
    pub fn invalid_hostname(cname_from: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHostname {
            cname_from: cname_from.into(),
            reason: reason.into(),
        }
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an activation failure error
    pub fn activation(activation_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::Activation {
            activation_id: activation_id.into(),
            status: status.into(),
        }
    }

    /// Wrap a failure with the position of the batch that caused it
    pub fn batch(batch: usize, total: usize, source: Error) -> Self {
        Self::Batch {
            batch,
            total,
            source: Box::new(source),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Whether retrying the same call later could succeed
    ///
    /// Used by the engine when polling activation status. Submissions are
    /// never retried regardless of this value.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::RateLimited(_) | Self::Io(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
