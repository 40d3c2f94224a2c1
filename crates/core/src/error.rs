//! Core error types for the operator's resource model.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for resource model and configuration operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // Resource model errors
    #[error("invalid label selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid phase transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid {kind} '{name}': {reason}")]
    InvalidResource {
        kind: String,
        name: String,
        reason: String,
    },

    #[error("unknown resource kind '{kind}'")]
    UnknownKind { kind: String },

    // I/O and parsing errors
    #[error("failed to read file '{path}': {reason}")]
    FileReadFailed { path: PathBuf, reason: String },

    #[error("TOML parse error: {reason}")]
    TomlParseFailed { reason: String },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    // Configuration errors
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Create an invalid selector error.
    pub fn invalid_selector(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid transition error.
    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Create an invalid resource error.
    pub fn invalid_resource(
        kind: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidResource {
            kind: kind.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown kind error.
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownKind { kind: kind.into() }
    }

    /// Create a file read error.
    pub fn file_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a TOML parse error.
    pub fn toml_parse_failed(reason: impl Into<String>) -> Self {
        Self::TomlParseFailed {
            reason: reason.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_selector("app!=chat", "only equality is supported");
        assert!(err.to_string().contains("app!=chat"));
        assert!(err.to_string().contains("equality"));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = Error::invalid_transition("Active", "Pending");
        assert_eq!(
            err.to_string(),
            "invalid phase transition from Active to Pending"
        );
    }
}
