//! Custom kind registration contract.

use async_trait::async_trait;
use linebot_core::Kind;
use linebot_core::kind::{GROUP, VERSION};

use crate::error::Result;

/// Descriptor for one custom kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomResourceDefinition {
    /// `<plural>.<group>`, e.g. `bots.line.you`.
    pub name: String,
    pub group: String,
    pub version: String,
    pub kind: Kind,
    pub plural: String,
    pub singular: String,
    pub namespaced: bool,
}

impl CustomResourceDefinition {
    /// Namespaced definition for `kind` in the operator's API group.
    pub fn for_kind(kind: Kind) -> Self {
        Self {
            name: format!("{}.{GROUP}", kind.plural()),
            group: GROUP.to_string(),
            version: VERSION.to_string(),
            kind,
            plural: kind.plural().to_string(),
            singular: kind.singular().to_string(),
            namespaced: true,
        }
    }

    /// Definitions for every kind the operator owns.
    pub fn operator_kinds() -> Vec<Self> {
        Kind::CUSTOM.into_iter().map(Self::for_kind).collect()
    }
}

/// Registers custom kinds with the orchestrator.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Register the definitions. Registering an existing definition succeeds.
    async fn register(&self, definitions: &[CustomResourceDefinition]) -> Result<()>;

    /// Whether the orchestrator reports the named definition as established.
    async fn is_established(&self, name: &str) -> Result<bool>;
}
