//! Object store trait and the tracing decorator.

use async_trait::async_trait;
use linebot_core::Kind;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::object::{ListParams, RawObject};
use crate::schema::{CustomResourceDefinition, SchemaRegistry};
use crate::watch::RawWatchEvent;

/// Trait for orchestrator object store backends.
///
/// Each call is atomic for the single object it touches; there are no
/// multi-object transactions.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a new object. Fails with `AlreadyExists` if the name is taken.
    async fn create(&self, object: RawObject) -> Result<RawObject>;

    /// Fetch one object.
    async fn get(&self, kind: Kind, namespace: &str, name: &str) -> Result<RawObject>;

    /// List objects of a kind, optionally scoped to a namespace and filtered by labels.
    async fn list(
        &self,
        kind: Kind,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> Result<Vec<RawObject>>;

    /// Replace an object.
    ///
    /// When `metadata.resource_version` is set it must match the stored
    /// version, otherwise the call fails with `Conflict`. When unset the write
    /// is unconditional.
    async fn update(&self, object: RawObject) -> Result<RawObject>;

    /// Delete an object, returning its last state.
    async fn delete(&self, kind: Kind, namespace: &str, name: &str) -> Result<RawObject>;

    /// Subscribe to every change, in commit order.
    fn subscribe(&self) -> broadcast::Receiver<RawWatchEvent>;
}

/// A wrapper that adds tracing to an object store.
pub struct TracingStore<S> {
    inner: S,
}

impl<S: ObjectStore> TracingStore<S> {
    /// Create a new tracing store.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    /// The wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for TracingStore<S> {
    async fn create(&self, object: RawObject) -> Result<RawObject> {
        tracing::debug!(
            kind = %object.kind,
            namespace = %object.namespace(),
            name = %object.name(),
            "Creating object"
        );
        let result = self.inner.create(object).await;
        if let Ok(ref created) = result {
            tracing::trace!(
                resource_version = ?created.metadata.resource_version,
                "Object created"
            );
        }
        result
    }

    async fn get(&self, kind: Kind, namespace: &str, name: &str) -> Result<RawObject> {
        tracing::debug!(kind = %kind, namespace, name, "Getting object");
        self.inner.get(kind, namespace, name).await
    }

    async fn list(
        &self,
        kind: Kind,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> Result<Vec<RawObject>> {
        tracing::debug!(
            kind = %kind,
            namespace = ?namespace,
            selector = ?params.label_selector,
            "Listing objects"
        );
        let result = self.inner.list(kind, namespace, params).await;
        if let Ok(ref items) = result {
            tracing::trace!(count = items.len(), "Objects listed");
        }
        result
    }

    async fn update(&self, object: RawObject) -> Result<RawObject> {
        tracing::debug!(
            kind = %object.kind,
            namespace = %object.namespace(),
            name = %object.name(),
            resource_version = ?object.metadata.resource_version,
            "Updating object"
        );
        self.inner.update(object).await
    }

    async fn delete(&self, kind: Kind, namespace: &str, name: &str) -> Result<RawObject> {
        tracing::debug!(kind = %kind, namespace, name, "Deleting object");
        self.inner.delete(kind, namespace, name).await
    }

    fn subscribe(&self) -> broadcast::Receiver<RawWatchEvent> {
        self.inner.subscribe()
    }
}

#[async_trait]
impl<S: ObjectStore + SchemaRegistry> SchemaRegistry for TracingStore<S> {
    async fn register(&self, definitions: &[CustomResourceDefinition]) -> Result<()> {
        tracing::debug!(count = definitions.len(), "Registering custom kinds");
        self.inner.register(definitions).await
    }

    async fn is_established(&self, name: &str) -> Result<bool> {
        self.inner.is_established(name).await
    }
}
