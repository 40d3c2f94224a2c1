//! Bot provisioning.
//!
//! A Bot in `Pending` or `Failed` is provisioned by creating its children in a
//! fixed order: ConfigMap, Service, Deployment, EventBinding. The first failing
//! step aborts the pipeline and leaves the Bot's status untouched, so the next
//! notification for the Bot retries from the top. Children that already exist
//! are accepted as-is. Once every child exists the Bot is marked `Active` with
//! a single status write.

pub mod templates;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use linebot_core::{Bot, BotPhase, OperatorConfig, OwnerReference, Resource};
use linebot_store::{Api, ObjectStore};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::ownership::OwnershipPolicy;
use crate::r#loop::Handler;
pub use templates::{ChildObjects, render_children};

/// One step of the provisioning pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisionStep {
    ConfigMap,
    Service,
    Deployment,
    EventBinding,
    Status,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ConfigMap => "configmap",
            Self::Service => "service",
            Self::Deployment => "deployment",
            Self::EventBinding => "eventbinding",
            Self::Status => "status",
        };
        f.write_str(s)
    }
}

/// Result of reconciling one Bot notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// Children exist and the stored Bot is now `Active`.
    Provisioned(Box<Bot>),
    /// The Bot's phase does not call for provisioning.
    Skipped { phase: BotPhase },
}

/// Drives Bots from `Pending`/`Failed` to `Active`.
pub struct BotReconciler {
    store: Arc<dyn ObjectStore>,
    ownership: Arc<OwnershipPolicy>,
    config: OperatorConfig,
}

impl BotReconciler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        ownership: Arc<OwnershipPolicy>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            store,
            ownership,
            config,
        }
    }

    /// Children `bot` would get, without touching the store.
    pub fn render(&self, bot: &Bot) -> ChildObjects {
        render_children(bot, &self.config)
    }

    /// Provision `bot` if its phase calls for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provision`] naming the first step that failed.
    pub async fn reconcile(&self, bot: &Bot) -> Result<ProvisionOutcome> {
        let phase = bot.phase();
        if !phase.needs_provisioning() {
            debug!(
                bot = %bot.name(),
                namespace = %bot.namespace(),
                phase = %phase,
                "Nothing to provision"
            );
            return Ok(ProvisionOutcome::Skipped { phase });
        }

        info!(
            bot = %bot.name(),
            namespace = %bot.namespace(),
            phase = %phase,
            "Provisioning bot"
        );
        let owner = OwnerReference::controller_of(bot);
        let children = self.render(bot);

        self.create_child(bot, ProvisionStep::ConfigMap, children.config_map, &owner)
            .await?;
        self.create_child(bot, ProvisionStep::Service, children.service, &owner)
            .await?;
        self.create_child(bot, ProvisionStep::Deployment, children.deployment, &owner)
            .await?;
        self.create_child(bot, ProvisionStep::EventBinding, children.event_binding, &owner)
            .await?;

        let mut active = bot.clone();
        active
            .status
            .transition(BotPhase::Active, String::new(), Utc::now())?;
        let bots: Api<Bot> = Api::namespaced(Arc::clone(&self.store), bot.namespace());
        let stored = bots
            .update(&active)
            .await
            .map_err(|e| Error::provision(bot.name(), ProvisionStep::Status, e))?;

        info!(bot = %bot.name(), namespace = %bot.namespace(), "Bot is active");
        Ok(ProvisionOutcome::Provisioned(Box::new(stored)))
    }

    async fn create_child<R: Resource>(
        &self,
        bot: &Bot,
        step: ProvisionStep,
        mut child: R,
        owner: &OwnerReference,
    ) -> Result<()> {
        self.ownership.apply(child.meta_mut(), owner).await;
        let api: Api<R> = Api::namespaced(Arc::clone(&self.store), bot.namespace());

        match api.create(&child).await {
            Ok(_) => {
                debug!(bot = %bot.name(), step = %step, name = %child.name(), "Created");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!(bot = %bot.name(), step = %step, name = %child.name(), "Already exists");
                Ok(())
            }
            Err(e) => Err(Error::provision(bot.name(), step, e)),
        }
    }
}

#[async_trait]
impl Handler<Bot> for BotReconciler {
    async fn on_added(&self, bot: Bot) -> Result<()> {
        self.reconcile(&bot).await.map(|_| ())
    }

    async fn on_modified(&self, bot: Bot) -> Result<()> {
        self.reconcile(&bot).await.map(|_| ())
    }

    async fn on_deleted(&self, bot: Bot) -> Result<()> {
        info!(bot = %bot.name(), namespace = %bot.namespace(), "Bot deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use linebot_core::{BotSpec, ConfigMap, Kind, LabelSelector, ObjectMeta};
    use linebot_store::{InMemoryStore, Operation, StoreError};

    use super::*;

    fn reconciler(store: &Arc<InMemoryStore>) -> BotReconciler {
        let store: Arc<dyn ObjectStore> = store.clone();
        BotReconciler::new(
            Arc::clone(&store),
            Arc::new(OwnershipPolicy::new(store)),
            OperatorConfig::default(),
        )
    }

    async fn seed_bot(store: &Arc<InMemoryStore>) -> Bot {
        let bots: Api<Bot> = Api::namespaced(store.clone(), "default");
        let spec = BotSpec {
            selector: Some(LabelSelector::from_pairs([("app", "chat")])),
            version: "v1".to_string(),
            ..BotSpec::default()
        };
        bots.create(&Bot::new(ObjectMeta::new("b1", "default"), spec))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_active_bot_is_skipped() {
        let store = InMemoryStore::new_arc();
        let mut bot = seed_bot(&store).await;
        bot.status.phase = Some(BotPhase::Active);

        let outcome = reconciler(&store).reconcile(&bot).await.unwrap();
        assert_eq!(
            outcome,
            ProvisionOutcome::Skipped {
                phase: BotPhase::Active
            }
        );
        assert_eq!(store.count(Kind::Deployment).await, 0);
    }

    #[tokio::test]
    async fn test_terminating_bot_is_skipped() {
        let store = InMemoryStore::new_arc();
        let mut bot = seed_bot(&store).await;
        bot.status.phase = Some(BotPhase::Terminating);

        let outcome = reconciler(&store).reconcile(&bot).await.unwrap();
        assert_eq!(
            outcome,
            ProvisionOutcome::Skipped {
                phase: BotPhase::Terminating
            }
        );
        assert_eq!(store.count(Kind::ConfigMap).await, 0);
        assert_eq!(store.count(Kind::EventBinding).await, 0);
    }

    #[tokio::test]
    async fn test_failed_bot_is_provisioned_and_activated() {
        let store = InMemoryStore::new_arc();
        let mut bot = seed_bot(&store).await;
        bot.status.phase = Some(BotPhase::Failed);
        bot.status.reason = "image pull".to_string();
        let bots: Api<Bot> = Api::namespaced(store.clone(), "default");
        let failed = bots.update(&bot).await.unwrap();

        let outcome = reconciler(&store).reconcile(&failed).await.unwrap();
        let ProvisionOutcome::Provisioned(stored) = outcome else {
            panic!("expected provisioning, got {outcome:?}")
        };
        assert_eq!(stored.phase(), BotPhase::Active);
        assert!(stored.status.reason.is_empty());
        assert_eq!(bots.get("b1").await.unwrap().phase(), BotPhase::Active);
        assert_eq!(store.count(Kind::Deployment).await, 1);
        assert_eq!(store.count(Kind::EventBinding).await, 1);
    }

    #[tokio::test]
    async fn test_step_failure_stops_pipeline_and_keeps_pending() {
        let store = InMemoryStore::new_arc();
        let bot = seed_bot(&store).await;
        store
            .inject_failure(
                Operation::Create,
                Kind::Service,
                StoreError::invalid("bad port"),
            )
            .await;

        let err = reconciler(&store).reconcile(&bot).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provision {
                step: ProvisionStep::Service,
                ..
            }
        ));
        assert_eq!(store.count(Kind::Deployment).await, 0);
        assert_eq!(store.count(Kind::EventBinding).await, 0);

        let bots: Api<Bot> = Api::namespaced(store.clone(), "default");
        assert_eq!(bots.get("b1").await.unwrap().phase(), BotPhase::Pending);
    }

    #[tokio::test]
    async fn test_existing_children_are_accepted() {
        let store = InMemoryStore::new_arc();
        let bot = seed_bot(&store).await;
        let config_maps: Api<ConfigMap> = Api::namespaced(store.clone(), "default");
        config_maps
            .create(&templates::render_config_map(&bot))
            .await
            .unwrap();

        let outcome = reconciler(&store).reconcile(&bot).await.unwrap();
        assert!(matches!(outcome, ProvisionOutcome::Provisioned(_)));
    }

    #[test]
    fn test_step_display() {
        assert_eq!(ProvisionStep::EventBinding.to_string(), "eventbinding");
        assert_eq!(ProvisionStep::ConfigMap.to_string(), "configmap");
    }
}
