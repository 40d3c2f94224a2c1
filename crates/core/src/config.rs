//! Operator configuration.
//!
//! Every field has a default, so an empty TOML file (or none at all) yields a
//! working configuration. CLI flags are applied on top by the binary.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default image for the bot runtime container.
pub const DEFAULT_BOT_IMAGE: &str = "kairen/linebot";

/// Default image for the tunnel sidecar container.
pub const DEFAULT_NGROK_IMAGE: &str = "kairen/ngrok";

/// Default service account for provisioned pods.
pub const DEFAULT_SERVICE_ACCOUNT: &str = "line-bot-operator";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// Namespace to watch. `None` watches every namespace.
    pub namespace: Option<String>,
    /// Delay between schema establishment attempts.
    pub init_retry_delay_secs: u64,
    /// Poll interval while waiting for a registered kind to be established.
    pub establish_interval_ms: u64,
    /// Upper bound on one establishment attempt.
    pub establish_timeout_secs: u64,
    /// Attempts per EventBinding write before a conflict is reported.
    pub conflict_retries: u32,
    /// Skip the owner reference probe and never set owner references.
    pub skip_owner_references: bool,
    pub bot_image: String,
    pub ngrok_image: String,
    pub service_account_name: String,
    /// `tracing` env-filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            init_retry_delay_secs: 10,
            establish_interval_ms: 500,
            establish_timeout_secs: 60,
            conflict_retries: 5,
            skip_owner_references: false,
            bot_image: DEFAULT_BOT_IMAGE.to_string(),
            ngrok_image: DEFAULT_NGROK_IMAGE.to_string(),
            service_account_name: DEFAULT_SERVICE_ACCOUNT.to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl OperatorConfig {
    /// Parse from TOML text and validate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TomlParseFailed`] on malformed input and
    /// [`Error::InvalidConfig`] when validation fails.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| Error::toml_parse_failed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileReadFailed`] if the file cannot be read, otherwise
    /// the errors of [`OperatorConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
        Self::from_toml_str(&text)
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.conflict_retries == 0 {
            return Err(Error::invalid_config("conflict_retries must be at least 1"));
        }
        if self.init_retry_delay_secs == 0 {
            return Err(Error::invalid_config(
                "init_retry_delay_secs must be greater than 0",
            ));
        }
        if self.establish_timeout_secs == 0 {
            return Err(Error::invalid_config(
                "establish_timeout_secs must be greater than 0",
            ));
        }
        if self.establish_interval_ms == 0 {
            return Err(Error::invalid_config(
                "establish_interval_ms must be greater than 0",
            ));
        }
        if self.bot_image.trim().is_empty() || self.ngrok_image.trim().is_empty() {
            return Err(Error::invalid_config("container images must not be empty"));
        }
        if self.namespace.as_deref().is_some_and(str::is_empty) {
            return Err(Error::invalid_config(
                "namespace must be omitted rather than empty",
            ));
        }
        Ok(())
    }

    pub const fn init_retry_delay(&self) -> Duration {
        Duration::from_secs(self.init_retry_delay_secs)
    }

    pub const fn establish_interval(&self) -> Duration {
        Duration::from_millis(self.establish_interval_ms)
    }

    pub const fn establish_timeout(&self) -> Duration {
        Duration::from_secs(self.establish_timeout_secs)
    }
}
