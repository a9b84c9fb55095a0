//! Error types for doclink
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! `Error` is `Clone`: a single shared read fans its outcome out to every
//! requester that joined it, failures included.

use crate::path::DocPath;
use thiserror::Error;

/// Result type alias for doclink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for doclink
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// A document read failed in the underlying store
    #[error("Read failed for '{path}': {message}")]
    Read {
        /// Path that was being read
        path: DocPath,
        /// Store-provided description
        message: String,
    },

    /// Query execution failed in the underlying store
    #[error("Query failed: {0}")]
    Query(String),

    /// A document references one of its own ancestors
    #[error("Reference cycle detected at '{path}'")]
    ReferenceCycle {
        /// Path that closes the cycle
        path: DocPath,
    },

    /// Reference chain is deeper than the configured bound
    #[error("Reference depth {depth} exceeded while resolving '{path}'")]
    DepthExceeded {
        /// Document at which the bound was hit
        path: DocPath,
        /// Configured maximum depth
        depth: usize,
    },

    /// Teardown was requested on a subscription that is already closed
    #[error("Subscription already closed")]
    SubscriptionClosed,

    /// The store failed to sever a push registration
    #[error("Listener teardown failed: {0}")]
    Teardown(String),

    /// The store could not register a push listener
    #[error("Listen failed: {0}")]
    Listen(String),

    /// The store reported an error on a live feed
    #[error("Push delivery failed: {0}")]
    Push(String),

    /// A mapped value could not be decoded into a model type
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed document path
    #[error("Invalid path: '{0}'")]
    InvalidPath(String),
}

impl Error {
    /// Create a read error for `path`
    pub fn read(path: DocPath, message: impl Into<String>) -> Self {
        Error::Read {
            path,
            message: message.into(),
        }
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Error::Query(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Whether this error originated in a remote read or query
    ///
    /// Transient failures are never cached; the caller may retry at once.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Read { .. } | Error::Query(_))
    }

    /// Whether this is the recoverable double-teardown error
    pub fn is_already_closed(&self) -> bool {
        matches!(self, Error::SubscriptionClosed)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> DocPath {
        DocPath::new(raw).unwrap()
    }

    #[test]
    fn test_error_display_read() {
        let err = Error::read(path("users/1"), "connection reset");
        let msg = err.to_string();
        assert!(msg.contains("Read failed"));
        assert!(msg.contains("users/1"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_error_display_cycle() {
        let err = Error::ReferenceCycle {
            path: path("teams/a"),
        };
        assert!(err.to_string().contains("teams/a"));
    }

    #[test]
    fn test_error_display_depth() {
        let err = Error::DepthExceeded {
            path: path("chain/9"),
            depth: 8,
        };
        let msg = err.to_string();
        assert!(msg.contains("depth 8"));
        assert!(msg.contains("chain/9"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::read(path("a/1"), "x").is_transient());
        assert!(Error::query("x").is_transient());
        assert!(!Error::SubscriptionClosed.is_transient());
        assert!(!Error::Teardown("x".into()).is_transient());
    }

    #[test]
    fn test_already_closed() {
        assert!(Error::SubscriptionClosed.is_already_closed());
        assert!(!Error::Teardown("boom".into()).is_already_closed());
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: Error = serde_json::from_str::<u32>("\"nope\"").unwrap_err().into();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_error_is_clone() {
        let err = Error::read(path("a/1"), "x");
        assert_eq!(err.clone(), err);
    }
}
