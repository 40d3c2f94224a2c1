//! Watch loop driving one handler per resource kind.

use std::sync::Arc;

use async_trait::async_trait;
use linebot_core::Resource;
use linebot_store::{Api, WatchEvent};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::shutdown::ShutdownListener;

/// Callbacks for one resource kind.
///
/// Notifications may be redelivered; implementations must be idempotent.
/// Errors are logged by the loop and never stop it.
#[async_trait]
pub trait Handler<R: Resource>: Send + Sync {
    async fn on_added(&self, object: R) -> Result<()>;

    async fn on_modified(&self, object: R) -> Result<()>;

    async fn on_deleted(&self, object: R) -> Result<()>;
}

/// Counters reported when a loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub received: u64,
    pub failed: u64,
}

/// Sequentially feeds one kind's notifications to its handler until shutdown.
pub struct WatchLoop<R: Resource> {
    api: Api<R>,
    handler: Arc<dyn Handler<R>>,
}

impl<R: Resource> WatchLoop<R> {
    pub fn new(api: Api<R>, handler: Arc<dyn Handler<R>>) -> Self {
        Self { api, handler }
    }

    /// Run until `shutdown` fires. An in-flight handler call is abandoned.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch cannot be opened or the store closes it.
    pub async fn run(self, mut shutdown: ShutdownListener) -> Result<LoopStats> {
        let mut stats = LoopStats::default();
        if shutdown.is_shutdown() {
            return Ok(stats);
        }

        let mut stream = self.api.watch().await?;
        info!(kind = %R::KIND, namespace = %self.api.namespace(), "Watching resources");

        loop {
            let event = tokio::select! {
                biased;
                signal = shutdown.recv() => {
                    info!(kind = %R::KIND, signal = %signal, "Stopping watch");
                    return Ok(stats);
                }
                next = stream.next() => match next {
                    Some(event) => event,
                    None => return Err(Error::WatchClosed { kind: R::KIND }),
                },
            };
            stats.received = stats.received.saturating_add(1);

            tokio::select! {
                biased;
                signal = shutdown.recv() => {
                    info!(
                        kind = %R::KIND,
                        signal = %signal,
                        "Stopping watch; in-flight notification abandoned"
                    );
                    return Ok(stats);
                }
                result = self.dispatch(event) => {
                    if let Err(e) = result {
                        stats.failed = stats.failed.saturating_add(1);
                        error!(kind = %R::KIND, error = %e, "Handler failed");
                    }
                }
            }
        }
    }

    async fn dispatch(&self, event: WatchEvent<R>) -> Result<()> {
        debug!(
            kind = %R::KIND,
            name = %event.object().name(),
            event_type = ?event.event_type(),
            "Dispatching notification"
        );
        match event {
            WatchEvent::Added(obj) => self.handler.on_added(obj).await,
            WatchEvent::Modified(obj) => self.handler.on_modified(obj).await,
            WatchEvent::Deleted(obj) => self.handler.on_deleted(obj).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use linebot_core::{EventBinding, ObjectMeta};
    use linebot_store::{InMemoryStore, ObjectStore, StoreError};
    use tokio::sync::Mutex;

    use super::*;
    use crate::shutdown::{ShutdownCoordinator, ShutdownSignal};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Handler<EventBinding> for Recorder {
        async fn on_added(&self, object: EventBinding) -> Result<()> {
            self.seen.lock().await.push(format!("added:{}", object.metadata.name));
            if object.metadata.name == "bad" {
                return Err(StoreError::invalid("rejected").into());
            }
            Ok(())
        }

        async fn on_modified(&self, object: EventBinding) -> Result<()> {
            self.seen.lock().await.push(format!("modified:{}", object.metadata.name));
            Ok(())
        }

        async fn on_deleted(&self, object: EventBinding) -> Result<()> {
            self.seen.lock().await.push(format!("deleted:{}", object.metadata.name));
            Ok(())
        }
    }

    async fn wait_for(recorder: &Recorder, count: usize) {
        for _ in 0..200 {
            if recorder.seen.lock().await.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_loop_dispatches_in_order_and_survives_errors() {
        let store: Arc<dyn ObjectStore> = InMemoryStore::new_arc();
        let api: Api<EventBinding> = Api::namespaced(Arc::clone(&store), "default");
        api.create(&EventBinding::new(ObjectMeta::new("bad", "default")))
            .await
            .unwrap();

        let recorder = Arc::new(Recorder::default());
        let coordinator = ShutdownCoordinator::new();
        let task = tokio::spawn(
            WatchLoop::new(api.clone(), recorder.clone() as Arc<dyn Handler<EventBinding>>)
                .run(coordinator.listener()),
        );

        wait_for(&recorder, 1).await;
        let created = api
            .create(&EventBinding::new(ObjectMeta::new("b1", "default")))
            .await
            .unwrap();
        api.update(&created).await.unwrap();
        api.delete("b1").await.unwrap();
        wait_for(&recorder, 4).await;

        coordinator.initiate_shutdown(ShutdownSignal::Programmatic);
        let stats = task.await.unwrap().unwrap();

        assert_eq!(
            *recorder.seen.lock().await,
            vec!["added:bad", "added:b1", "modified:b1", "deleted:b1"]
        );
        assert_eq!(stats.received, 4);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_loop_exits_immediately_after_prior_shutdown() {
        let store: Arc<dyn ObjectStore> = InMemoryStore::new_arc();
        let api: Api<EventBinding> = Api::all(store);
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown(ShutdownSignal::Sigint);

        let recorder: Arc<dyn Handler<EventBinding>> = Arc::new(Recorder::default());
        let stats = WatchLoop::new(api, recorder)
            .run(coordinator.listener())
            .await
            .unwrap();
        assert_eq!(stats, LoopStats::default());
    }
}
