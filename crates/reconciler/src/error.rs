//! Error types for the reconciler crate.

use linebot_core::Kind;
use linebot_store::StoreError;
use thiserror::Error;

use crate::provision::ProvisionStep;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] linebot_core::Error),

    /// One step of the bot provisioning pipeline failed; later steps did not run.
    #[error("provisioning {step} for bot '{bot}' failed: {source}")]
    Provision {
        bot: String,
        step: ProvisionStep,
        #[source]
        source: StoreError,
    },

    #[error("eventbinding '{binding}' still conflicting after {attempts} attempts")]
    ConflictRetriesExhausted { binding: String, attempts: u32 },

    #[error("event '{event}' failed to sync {failures} eventbinding(s)")]
    SyncFailed { event: String, failures: usize },

    #[error("{kind} watch closed")]
    WatchClosed { kind: Kind },
}

impl Error {
    /// Create a provisioning error.
    pub fn provision(bot: impl Into<String>, step: ProvisionStep, source: StoreError) -> Self {
        Self::Provision {
            bot: bot.into(),
            step,
            source,
        }
    }

    /// Create a conflict-retries-exhausted error.
    pub fn conflict_retries_exhausted(binding: impl Into<String>, attempts: u32) -> Self {
        Self::ConflictRetriesExhausted {
            binding: binding.into(),
            attempts,
        }
    }

    /// Create a sync failed error.
    pub fn sync_failed(event: impl Into<String>, failures: usize) -> Self {
        Self::SyncFailed {
            event: event.into(),
            failures,
        }
    }

    /// Whether the underlying cause is an optimistic-concurrency conflict.
    pub const fn is_conflict(&self) -> bool {
        match self {
            Self::Store(e) | Self::Provision { source: e, .. } => e.is_conflict(),
            Self::ConflictRetriesExhausted { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provision_error_names_the_step() {
        let err = Error::provision(
            "b1",
            ProvisionStep::Service,
            StoreError::forbidden("quota exceeded"),
        );
        let text = err.to_string();
        assert!(text.contains("service"));
        assert!(text.contains("b1"));
        assert!(text.contains("quota exceeded"));
    }

    #[test]
    fn test_exhausted_retries_count_as_conflict() {
        assert!(Error::conflict_retries_exhausted("b1", 5).is_conflict());
        assert!(!Error::sync_failed("greet", 1).is_conflict());
    }
}
