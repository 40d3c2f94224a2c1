//! Errors raised by the operator process itself.
//!
//! Library errors from the store and the reconcilers pass through unchanged;
//! the variants added here cover startup and manifest handling.

use std::path::PathBuf;
use std::time::Duration;

use linebot_store::StoreError;
use thiserror::Error;

/// Result type alias for operator operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] linebot_core::Error),

    #[error(transparent)]
    Reconciler(#[from] linebot_reconciler::Error),

    #[error("custom resource '{name}' not established within {timeout:?}")]
    SchemaTimeout { name: String, timeout: Duration },

    #[error("shutdown requested before startup completed")]
    Interrupted,

    #[error("manifest document {index}: {reason}")]
    InvalidManifest { index: usize, reason: String },

    #[error("failed to read '{path}': {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to render manifest: {reason}")]
    RenderFailed { reason: String },
}

impl Error {
    pub fn schema_timeout(name: impl Into<String>, timeout: Duration) -> Self {
        Self::SchemaTimeout {
            name: name.into(),
            timeout,
        }
    }

    pub fn invalid_manifest(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidManifest {
            index,
            reason: reason.into(),
        }
    }

    pub fn read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn render_failed(reason: impl Into<String>) -> Self {
        Self::RenderFailed {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_failing_item() {
        let err = Error::schema_timeout("bots.line.you", Duration::from_secs(60));
        assert_eq!(
            err.to_string(),
            "custom resource 'bots.line.you' not established within 60s"
        );

        let err = Error::invalid_manifest(2, "missing kind");
        assert_eq!(err.to_string(), "manifest document 2: missing kind");
    }

    #[test]
    fn test_store_errors_pass_through() {
        let err: Error = StoreError::unavailable("down").into();
        assert!(matches!(err, Error::Store(_)));
    }
}
