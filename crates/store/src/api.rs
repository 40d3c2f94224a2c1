//! Typed facade over an [`ObjectStore`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use linebot_core::{DEFAULT_NAMESPACE, Resource};

use crate::error::Result;
use crate::object::{ListParams, RawObject};
use crate::store::ObjectStore;
use crate::watch::WatchStream;

/// Typed access to one kind of record, scoped to a namespace or to all of them.
pub struct Api<R> {
    store: Arc<dyn ObjectStore>,
    namespace: Option<String>,
    _marker: PhantomData<fn() -> R>,
}

impl<R> Clone for Api<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            namespace: self.namespace.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R> fmt::Debug for Api<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl<R: Resource> Api<R> {
    /// Api scoped to one namespace.
    pub fn namespaced(store: Arc<dyn ObjectStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: Some(namespace.into()),
            _marker: PhantomData,
        }
    }

    /// Api spanning every namespace.
    pub fn all(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            namespace: None,
            _marker: PhantomData,
        }
    }

    /// Api for `namespace`, or for every namespace when `None`.
    pub fn scoped(store: Arc<dyn ObjectStore>, namespace: Option<&str>) -> Self {
        namespace.map_or_else(
            || Self::all(Arc::clone(&store)),
            |ns| Self::namespaced(Arc::clone(&store), ns),
        )
    }

    /// Namespace used for name-addressed calls.
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Create `object`. An unset namespace is filled from this api's scope.
    ///
    /// # Errors
    ///
    /// Propagates store errors, notably `AlreadyExists`.
    pub async fn create(&self, object: &R) -> Result<R> {
        let raw = self.prepare(object)?;
        self.store.create(raw).await?.into_resource()
    }

    /// Fetch `name`.
    ///
    /// # Errors
    ///
    /// Propagates store errors, notably `NotFound`.
    pub async fn get(&self, name: &str) -> Result<R> {
        self.store
            .get(R::KIND, self.namespace(), name)
            .await?
            .into_resource()
    }

    /// List objects matching `params`.
    ///
    /// # Errors
    ///
    /// Propagates store errors, including `Invalid` for unsupported selectors.
    pub async fn list(&self, params: &ListParams) -> Result<Vec<R>> {
        self.store
            .list(R::KIND, self.namespace.as_deref(), params)
            .await?
            .into_iter()
            .map(RawObject::into_resource)
            .collect()
    }

    /// Replace `object`, guarded by its resource version when set.
    ///
    /// # Errors
    ///
    /// Propagates store errors, notably `Conflict` and `NotFound`.
    pub async fn update(&self, object: &R) -> Result<R> {
        let raw = self.prepare(object)?;
        self.store.update(raw).await?.into_resource()
    }

    /// Delete `name`, returning its last state.
    ///
    /// # Errors
    ///
    /// Propagates store errors, notably `NotFound`.
    pub async fn delete(&self, name: &str) -> Result<R> {
        self.store
            .delete(R::KIND, self.namespace(), name)
            .await?
            .into_resource()
    }

    /// Open a notification stream: existing objects first, then live changes.
    ///
    /// # Errors
    ///
    /// Propagates errors from the initial list.
    pub async fn watch(&self) -> Result<WatchStream<R>> {
        let receiver = self.store.subscribe();
        let existing = self.list(&ListParams::default()).await?;
        Ok(WatchStream::new(
            existing,
            Arc::clone(&self.store),
            receiver,
            self.namespace.clone(),
        ))
    }

    fn prepare(&self, object: &R) -> Result<RawObject> {
        let mut raw = RawObject::from_resource(object)?;
        if raw.metadata.namespace.is_empty() {
            raw.metadata.namespace = self.namespace().to_string();
        }
        Ok(raw)
    }
}
