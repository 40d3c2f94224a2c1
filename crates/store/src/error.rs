//! Error types for the store crate.

use linebot_core::Kind;
use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Failures reported by an object store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Create of an object whose name is already taken.
    #[error("{kind} '{namespace}/{name}' already exists")]
    AlreadyExists {
        kind: Kind,
        namespace: String,
        name: String,
    },

    /// Get, update or delete of a missing object.
    #[error("{kind} '{namespace}/{name}' not found")]
    NotFound {
        kind: Kind,
        namespace: String,
        name: String,
    },

    /// Update carried a stale resource version.
    #[error(
        "conflict updating {kind} '{namespace}/{name}': expected version {expected}, found {actual}"
    )]
    Conflict {
        kind: Kind,
        namespace: String,
        name: String,
        expected: String,
        actual: String,
    },

    /// The request was malformed.
    #[error("invalid request: {reason}")]
    Invalid { reason: String },

    /// The store refused the request.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// The store could not be reached.
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    /// An object could not be converted to or from its stored form.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl StoreError {
    /// Create an already-exists error.
    pub fn already_exists(
        kind: Kind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::AlreadyExists {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(kind: Kind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(
        kind: Kind,
        namespace: impl Into<String>,
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind,
            namespace: namespace.into(),
            name: name.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid request error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    /// Create a forbidden error.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }

    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<linebot_core::Error> for StoreError {
    fn from(err: linebot_core::Error) -> Self {
        match err {
            linebot_core::Error::Serialization { reason } => Self::Serialization { reason },
            other => Self::invalid(other.to_string()),
        }
    }
}
