//! Resource kinds and the trait every stored record implements.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::meta::ObjectMeta;

/// API group of the operator's custom resources.
pub const GROUP: &str = "line.you";

/// API version of the operator's custom resources.
pub const VERSION: &str = "v1alpha1";

/// Every kind of record the operator reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Bot,
    Event,
    EventBinding,
    ConfigMap,
    Service,
    Deployment,
}

impl Kind {
    /// The custom kinds owned by this operator, in registration order.
    pub const CUSTOM: [Self; 3] = [Self::Bot, Self::Event, Self::EventBinding];

    /// Kind name as it appears in manifests.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bot => "Bot",
            Self::Event => "Event",
            Self::EventBinding => "EventBinding",
            Self::ConfigMap => "ConfigMap",
            Self::Service => "Service",
            Self::Deployment => "Deployment",
        }
    }

    /// `apiVersion` string for this kind.
    pub const fn api_version(self) -> &'static str {
        match self {
            Self::Bot | Self::Event | Self::EventBinding => "line.you/v1alpha1",
            Self::ConfigMap | Self::Service => "v1",
            Self::Deployment => "apps/v1",
        }
    }

    /// Lowercase singular name.
    pub const fn singular(self) -> &'static str {
        match self {
            Self::Bot => "bot",
            Self::Event => "event",
            Self::EventBinding => "eventbinding",
            Self::ConfigMap => "configmap",
            Self::Service => "service",
            Self::Deployment => "deployment",
        }
    }

    /// Lowercase plural name used in resource paths.
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Bot => "bots",
            Self::Event => "events",
            Self::EventBinding => "eventbindings",
            Self::ConfigMap => "configmaps",
            Self::Service => "services",
            Self::Deployment => "deployments",
        }
    }

    /// Whether the kind is a custom resource that must be registered.
    pub const fn is_custom(self) -> bool {
        matches!(self, Self::Bot | Self::Event | Self::EventBinding)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Bot" => Ok(Self::Bot),
            "Event" => Ok(Self::Event),
            "EventBinding" => Ok(Self::EventBinding),
            "ConfigMap" => Ok(Self::ConfigMap),
            "Service" => Ok(Self::Service),
            "Deployment" => Ok(Self::Deployment),
            other => Err(Error::unknown_kind(other)),
        }
    }
}

/// A typed record that can be stored, listed and watched.
pub trait Resource:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Kind of this record.
    const KIND: Kind;

    /// Object metadata.
    fn meta(&self) -> &ObjectMeta;

    /// Mutable object metadata.
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    /// Object name.
    fn name(&self) -> &str {
        &self.meta().name
    }

    /// Object namespace, `default` when unset.
    fn namespace(&self) -> &str {
        self.meta().namespace_or_default()
    }
}

/// Implements [`Resource`] for a struct with a `metadata: ObjectMeta` field.
#[macro_export]
macro_rules! impl_resource {
    ($ty:ty, $kind:expr) => {
        impl $crate::kind::Resource for $ty {
            const KIND: $crate::kind::Kind = $kind;

            fn meta(&self) -> &$crate::meta::ObjectMeta {
                &self.metadata
            }

            fn meta_mut(&mut self) -> &mut $crate::meta::ObjectMeta {
                &mut self.metadata
            }
        }
    };
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_name() {
        for kind in [
            Kind::Bot,
            Kind::Event,
            Kind::EventBinding,
            Kind::ConfigMap,
            Kind::Service,
            Kind::Deployment,
        ] {
            assert_eq!(kind.as_str().parse::<Kind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = "Secret".parse::<Kind>().unwrap_err();
        assert_eq!(err, Error::unknown_kind("Secret"));
    }

    #[test]
    fn test_only_operator_kinds_are_custom() {
        assert!(Kind::CUSTOM.iter().all(|k| k.is_custom()));
        assert!(!Kind::Deployment.is_custom());
        assert_eq!(Kind::EventBinding.api_version(), "line.you/v1alpha1");
    }
}
