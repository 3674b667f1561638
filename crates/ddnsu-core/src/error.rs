//! Error types for DDNSU
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for DDNSU operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for DDNSU
#[derive(Error, Debug)]
pub enum Error {
    /// No IP lookup endpoint produced a usable address
    #[error("No IP quorum: {0}")]
    NoQuorum(String),

    /// Configuration errors (including integrity violations)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration persistence errors
    #[error("Config store error: {0}")]
    ConfigStore(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from provider APIs and lookup endpoints)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Record or zone not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a quorum failure error
    pub fn no_quorum(msg: impl Into<String>) -> Self {
        Self::NoQuorum(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a config store error
    pub fn config_store(msg: impl Into<String>) -> Self {
        Self::ConfigStore(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort a whole reconciliation pass.
    ///
    /// Fatal errors are quorum failures, credential failures and
    /// configuration problems. Everything else is scoped to a domain or
    /// a single record, and is worth retrying on the next pass.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoQuorum(_) | Self::Authentication(_) | Self::Config(_) | Self::ConfigStore(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(Error::no_quorum("all endpoints failed").is_fatal());
        assert!(Error::auth("bad token").is_fatal());
        assert!(Error::config("duplicate comment").is_fatal());
        assert!(!Error::provider("cloudflare", "500").is_fatal());
        assert!(!Error::http("timeout").is_fatal());
    }

    #[test]
    fn provider_error_display() {
        let err = Error::provider("vercel", "Rate limit exceeded");
        assert_eq!(err.to_string(), "Provider error (vercel): Rate limit exceeded");
    }
}
