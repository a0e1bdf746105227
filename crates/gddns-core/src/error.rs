//! Error types for the gddns agent
//!
//! This module defines all error types used throughout the crate.
//!
//! Errors are classified along the lines the reconciliation loop cares
//! about: fatal errors (bad credentials, bad configuration) terminate the
//! process, everything else is absorbed at the pass boundary and logged.

use thiserror::Error;

/// Result type alias for gddns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the gddns agent
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors (connection refused, timeouts, non-success status)
    #[error("HTTP error: {0}")]
    Http(String),

    /// A collaborator answered, but the answer could not be understood
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The provider refused a change because its precondition did not hold
    /// (record mismatch on delete, duplicate record on create)
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// The provider returned a record set for a different name than configured
    #[error("Hostname mismatch: configured {expected}, provider returned {found}")]
    HostnameMismatch {
        /// Host name from the configuration
        expected: String,
        /// Record set name returned by the provider
        found: String,
    },

    /// Provider answered with a status no other variant covers
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a malformed response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a precondition failure
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    /// Create a hostname mismatch error
    pub fn hostname_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::HostnameMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error must terminate the process.
    ///
    /// Authorization and configuration failures cannot be fixed by waiting
    /// for the next pass.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::Config(_))
    }

    /// Whether this error is a transient transport condition
    ///
    /// The scheduler treats these the same as any other recoverable error,
    /// but logs them at a lower level.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::RateLimited(_))
    }
}
