//! Error types for gateway graph discovery
//!
//! Only conditions that prevent a discovery pass from running at all are
//! errors: an unreachable store, a kind whose listing fails, or an invalid
//! configuration. Problems inside the fetched data (dangling references,
//! duplicates, cycles) are reported as diagnostics next to the graph instead.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for gateway graph operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Listing a resource kind from the object store failed
    #[error("fetch error for {kind}: {message}")]
    Fetch {
        /// Resource kind that could not be listed
        kind: String,
        /// Description of what failed
        message: String,
        /// Whether retrying the discovery pass may succeed
        retryable: bool,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being parsed (if known)
        kind: Option<String>,
    },

    /// Invalid discovery configuration
    #[error("configuration error: {message}")]
    Config {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "policyKinds[0].version")
        field: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "create_client", "store")
        context: String,
    },
}

impl Error {
    /// Create a retryable fetch error for a resource kind
    pub fn fetch_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            kind: kind.into(),
            message: msg.into(),
            retryable: true,
        }
    }

    /// Create a fetch error that will not succeed on retry (e.g., forbidden)
    pub fn fetch_permanent(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            kind: kind.into(),
            message: msg.into(),
            retryable: false,
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a configuration error pointing at a specific field
    pub fn config_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Configuration and serialization errors need a fix before retrying.
    /// Kubernetes errors are retryable unless the API server rejected the
    /// request with a 4xx status.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Fetch { retryable, .. } => *retryable,
            Error::Serialization { .. } => false,
            Error::Config { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Get the resource kind if this error is associated with one
    pub fn kind(&self) -> Option<&str> {
        match self {
            Error::Fetch { kind, .. } => Some(kind),
            Error::Serialization { kind, .. } => kind.as_deref(),
            _ => None,
        }
    }
}
