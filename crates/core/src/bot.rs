//! The Bot resource and its lifecycle phases.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::impl_resource;
use crate::kind::Kind;
use crate::meta::ObjectMeta;
use crate::selector::LabelSelector;

/// Declarative request for one running bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bot {
    pub metadata: ObjectMeta,
    pub spec: BotSpec,
    #[serde(default)]
    pub status: BotStatus,
}

impl_resource!(Bot, Kind::Bot);

impl Bot {
    /// Create a bot with an empty status.
    pub fn new(metadata: ObjectMeta, spec: BotSpec) -> Self {
        Self {
            metadata,
            spec,
            status: BotStatus::default(),
        }
    }

    /// Current phase; an unset phase reads as [`BotPhase::Pending`].
    pub fn phase(&self) -> BotPhase {
        self.status.phase.unwrap_or_default()
    }

    /// Labels of the bot's selector, empty when no selector is declared.
    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        self.spec
            .selector
            .as_ref()
            .map(|s| s.match_labels.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotSpec {
    /// Matched against Event labels through the bot's EventBinding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
    /// Secret holding `channelSecret` and `channelToken`.
    #[serde(default)]
    pub channel_secret_name: String,
    #[serde(default)]
    pub expose: BotExpose,
    /// Image tag for both containers.
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub log_level: u32,
}

/// How the bot's webhook is reached from outside the cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotExposeType {
    #[default]
    Ngrok,
    Ingress,
    LoadBalancer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotExpose {
    #[serde(rename = "type", default)]
    pub expose_type: BotExposeType,
    #[serde(default)]
    pub domain_name: String,
    #[serde(
        rename = "loadBalanceIPs",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub load_balance_ips: Vec<String>,
    #[serde(default)]
    pub ngrok_token: String,
}

/// Coarse lifecycle state of a Bot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BotPhase {
    #[default]
    Pending,
    Active,
    Failed,
    Terminating,
}

impl BotPhase {
    /// Whether the provisioning pipeline should run for a bot in this phase.
    pub const fn needs_provisioning(self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a forward transition.
    ///
    /// Writing the same phase again is allowed.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Pending | Self::Active | Self::Failed)
                | (Self::Failed, Self::Failed | Self::Active)
                | (Self::Active, Self::Active | Self::Terminating)
                | (Self::Terminating, Self::Terminating)
        )
    }
}

impl fmt::Display for BotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Failed => "Failed",
            Self::Terminating => "Terminating",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<BotPhase>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}

impl BotStatus {
    /// Move to `next`, recording `reason` and the update time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] when `next` would move the phase
    /// backwards; the status is left untouched in that case.
    pub fn transition(
        &mut self,
        next: BotPhase,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let current = self.phase.unwrap_or_default();
        if !current.can_transition_to(next) {
            return Err(Error::invalid_transition(current, next));
        }
        self.phase = Some(next);
        self.reason = reason.into();
        self.last_update_time = Some(now);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_phase_reads_as_pending() {
        let bot = Bot::new(ObjectMeta::new("b1", "default"), BotSpec::default());
        assert_eq!(bot.phase(), BotPhase::Pending);
        assert!(bot.phase().needs_provisioning());
    }

    #[test]
    fn test_forward_transitions_are_allowed() {
        assert!(BotPhase::Pending.can_transition_to(BotPhase::Active));
        assert!(BotPhase::Pending.can_transition_to(BotPhase::Failed));
        assert!(BotPhase::Failed.can_transition_to(BotPhase::Active));
        assert!(BotPhase::Active.can_transition_to(BotPhase::Terminating));
    }

    #[test]
    fn test_active_never_regresses_to_pending() {
        let mut status = BotStatus::default();
        status
            .transition(BotPhase::Active, "", Utc::now())
            .unwrap();

        let err = status
            .transition(BotPhase::Pending, "retry", Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(status.phase, Some(BotPhase::Active));
        assert!(status.reason.is_empty());
    }

    #[test]
    fn test_bot_manifest_deserializes() {
        let yaml = r"
metadata:
  name: b1
  namespace: default
spec:
  selector:
    matchLabels:
      app: chat
  channelSecretName: line-secret
  expose:
    type: Ngrok
    ngrokToken: tok-123
    loadBalanceIPs: [10.0.0.1]
  version: v1
  logLevel: 2
";
        let bot: Bot = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(bot.spec.expose.expose_type, BotExposeType::Ngrok);
        assert_eq!(bot.spec.expose.ngrok_token, "tok-123");
        assert_eq!(bot.spec.expose.load_balance_ips, vec!["10.0.0.1"]);
        assert_eq!(bot.spec.log_level, 2);
        assert_eq!(bot.selector_labels().get("app").map(String::as_str), Some("chat"));
        assert_eq!(bot.status, BotStatus::default());
    }
}
