//! Owner reference capability.
//!
//! Whether the orchestrator accepts owner references is discovered once per
//! namespace by creating a throwaway probe object. A failed probe disables
//! owner references in that namespace for the rest of the run: children are
//! still created, they just won't be garbage collected with their Bot.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use linebot_core::{ConfigMap, ObjectMeta, OwnerReference};
use linebot_store::{Api, ObjectStore};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Name of the probe object created in each namespace.
pub const PROBE_NAME: &str = "test-ownerref";

/// Outcome of the owner reference probe for a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerRefMode {
    Enabled,
    Disabled,
}

impl fmt::Display for OwnerRefMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// Decides whether provisioned objects carry owner references.
pub struct OwnershipPolicy {
    store: Option<Arc<dyn ObjectStore>>,
    modes: Mutex<HashMap<String, OwnerRefMode>>,
}

impl OwnershipPolicy {
    /// Probe lazily against `store`.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store: Some(store),
            modes: Mutex::new(HashMap::new()),
        }
    }

    /// Never set owner references and never probe.
    pub fn disabled() -> Self {
        Self {
            store: None,
            modes: Mutex::new(HashMap::new()),
        }
    }

    /// Mode for `namespace`, if it has been decided.
    pub async fn mode(&self, namespace: &str) -> Option<OwnerRefMode> {
        if self.store.is_none() {
            return Some(OwnerRefMode::Disabled);
        }
        self.modes.lock().await.get(namespace).copied()
    }

    /// Attach `owner` to `meta` unless owner references are disabled in its namespace.
    ///
    /// The first call for a namespace runs the probe using `owner`.
    pub async fn apply(&self, meta: &mut ObjectMeta, owner: &OwnerReference) -> OwnerRefMode {
        let Some(store) = &self.store else {
            return OwnerRefMode::Disabled;
        };

        let namespace = meta.namespace_or_default().to_string();
        let mode = {
            let mut modes = self.modes.lock().await;
            match modes.get(&namespace) {
                Some(mode) => *mode,
                None => {
                    let mode = probe(Arc::clone(store), &namespace, owner).await;
                    modes.insert(namespace, mode);
                    mode
                }
            }
        };

        if mode == OwnerRefMode::Enabled {
            meta.owner_references = vec![owner.clone()];
        }
        mode
    }
}

impl fmt::Debug for OwnershipPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnershipPolicy")
            .field("probing", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

async fn probe(
    store: Arc<dyn ObjectStore>,
    namespace: &str,
    owner: &OwnerReference,
) -> OwnerRefMode {
    let config_maps: Api<ConfigMap> = Api::namespaced(store, namespace);
    let mut metadata = ObjectMeta::new(PROBE_NAME, namespace);
    metadata.owner_references = vec![owner.clone()];
    let probe = ConfigMap {
        metadata,
        ..ConfigMap::default()
    };

    match config_maps.create(&probe).await {
        Ok(_) => {}
        Err(e) if e.is_already_exists() => {}
        Err(e) => {
            warn!(
                namespace,
                error = %e,
                "Owner references will not be set; probe object was rejected"
            );
            return OwnerRefMode::Disabled;
        }
    }
    info!(namespace, "Verified owner references can be set");
    OwnerRefMode::Enabled
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use linebot_core::{Bot, BotSpec, Kind};
    use linebot_store::{InMemoryStore, Operation, StoreError};

    use super::*;

    fn owner() -> OwnerReference {
        let mut bot = Bot::new(ObjectMeta::new("b1", "default"), BotSpec::default());
        bot.metadata.uid = Some("uid-1".to_string());
        OwnerReference::controller_of(&bot)
    }

    #[tokio::test]
    async fn test_probe_success_enables_owner_references() {
        let store = InMemoryStore::new_arc();
        let policy = OwnershipPolicy::new(store.clone());

        let mut meta = ObjectMeta::new("child", "default");
        let mode = policy.apply(&mut meta, &owner()).await;

        assert_eq!(mode, OwnerRefMode::Enabled);
        assert_eq!(meta.owner_references.len(), 1);
        assert_eq!(store.count(Kind::ConfigMap).await, 1);
    }

    #[tokio::test]
    async fn test_existing_probe_object_counts_as_success() {
        let store = InMemoryStore::new_arc();
        let config_maps: Api<ConfigMap> = Api::namespaced(store.clone(), "default");
        config_maps
            .create(&ConfigMap {
                metadata: ObjectMeta::new(PROBE_NAME, "default"),
                ..ConfigMap::default()
            })
            .await
            .unwrap();

        let policy = OwnershipPolicy::new(store);
        let mut meta = ObjectMeta::new("child", "default");
        assert_eq!(policy.apply(&mut meta, &owner()).await, OwnerRefMode::Enabled);
    }

    #[tokio::test]
    async fn test_rejected_probe_disables_namespace_only() {
        let store = InMemoryStore::new_arc();
        store
            .inject_failure(
                Operation::Create,
                Kind::ConfigMap,
                StoreError::forbidden("no owner references"),
            )
            .await;
        let policy = OwnershipPolicy::new(store.clone());

        let mut meta = ObjectMeta::new("child", "default");
        assert_eq!(policy.apply(&mut meta, &owner()).await, OwnerRefMode::Disabled);
        assert!(meta.owner_references.is_empty());

        // Decided once: no second probe in the same namespace.
        let mut again = ObjectMeta::new("child2", "default");
        assert_eq!(policy.apply(&mut again, &owner()).await, OwnerRefMode::Disabled);
        assert_eq!(store.count(Kind::ConfigMap).await, 0);

        let mut elsewhere = ObjectMeta::new("child", "bots");
        assert_eq!(policy.apply(&mut elsewhere, &owner()).await, OwnerRefMode::Enabled);
        assert_eq!(policy.mode("default").await, Some(OwnerRefMode::Disabled));
    }

    #[tokio::test]
    async fn test_disabled_policy_never_probes() {
        let policy = OwnershipPolicy::disabled();
        let mut meta = ObjectMeta::new("child", "default");

        assert_eq!(policy.apply(&mut meta, &owner()).await, OwnerRefMode::Disabled);
        assert!(meta.owner_references.is_empty());
        assert_eq!(policy.mode("default").await, Some(OwnerRefMode::Disabled));
    }
}
