//! In-memory object store.
//!
//! Behaves like the orchestrator's store for the parts the operator relies on:
//! per-object resource versions with conflict detection, equality label
//! selectors, ordered change broadcasts and custom kind registration. Faults
//! can be injected per operation and kind for testing failure paths.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use linebot_core::{DEFAULT_NAMESPACE, Kind};
use tokio::sync::{Mutex, RwLock, broadcast};
use ulid::Ulid;

use crate::error::{Result, StoreError};
use crate::object::{ListParams, RawObject};
use crate::schema::{CustomResourceDefinition, SchemaRegistry};
use crate::store::ObjectStore;
use crate::watch::{RawWatchEvent, WatchEventType};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Store operations that faults can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Get,
    List,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Get => "get",
            Self::List => "list",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ObjectKey {
    kind: Kind,
    namespace: String,
    name: String,
}

impl ObjectKey {
    fn of(object: &RawObject) -> Self {
        Self {
            kind: object.kind,
            namespace: object.namespace().to_string(),
            name: object.name().to_string(),
        }
    }
}

struct Fault {
    operation: Operation,
    kind: Kind,
    error: StoreError,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, RawObject>,
    version: u64,
}

impl State {
    fn next_version(&mut self) -> Result<String> {
        self.version = self
            .version
            .checked_add(1)
            .ok_or_else(|| StoreError::unavailable("resource version space exhausted"))?;
        Ok(self.version.to_string())
    }
}

/// In-memory object store for local runs and tests.
pub struct InMemoryStore {
    state: RwLock<State>,
    events: broadcast::Sender<RawWatchEvent>,
    faults: Mutex<Vec<Fault>>,
    allow_owner_references: bool,
    definitions: RwLock<HashMap<String, u32>>,
    establish_after_polls: u32,
    registration_failures: AtomicU32,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        InMemoryStoreBuilder::new().build()
    }
}

impl InMemoryStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new in-memory store wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Start building a store with non-default behavior.
    pub const fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::new()
    }

    /// Make the next `operation` on `kind` fail with `error`.
    ///
    /// Faults are consumed in the order they were injected.
    pub async fn inject_failure(&self, operation: Operation, kind: Kind, error: StoreError) {
        self.faults.lock().await.push(Fault {
            operation,
            kind,
            error,
        });
    }

    /// Number of stored objects of `kind` across all namespaces.
    pub async fn count(&self, kind: Kind) -> usize {
        self.state
            .read()
            .await
            .objects
            .keys()
            .filter(|k| k.kind == kind)
            .count()
    }

    async fn take_fault(&self, operation: Operation, kind: Kind) -> Result<()> {
        let mut faults = self.faults.lock().await;
        match faults
            .iter()
            .position(|f| f.operation == operation && f.kind == kind)
        {
            Some(index) => {
                let fault = faults.remove(index);
                tracing::debug!(operation = %operation, kind = %kind, "Injected fault fired");
                Err(fault.error)
            }
            None => Ok(()),
        }
    }

    fn check_owner_references(&self, object: &RawObject) -> Result<()> {
        if !self.allow_owner_references && !object.metadata.owner_references.is_empty() {
            return Err(StoreError::forbidden(format!(
                "owner references are not permitted on {} '{}'",
                object.kind,
                object.name()
            )));
        }
        Ok(())
    }

    fn publish(&self, event_type: WatchEventType, object: &RawObject) {
        // No subscribers is not an error.
        let _ = self
            .events
            .send(RawWatchEvent::new(event_type, object.clone()));
    }
}

fn normalize(mut object: RawObject) -> Result<RawObject> {
    if object.metadata.name.trim().is_empty() {
        return Err(StoreError::invalid(format!(
            "{} must have a name",
            object.kind
        )));
    }
    if object.metadata.namespace.is_empty() {
        object.metadata.namespace = DEFAULT_NAMESPACE.to_string();
    }
    Ok(object)
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn create(&self, object: RawObject) -> Result<RawObject> {
        self.take_fault(Operation::Create, object.kind).await?;
        let mut object = normalize(object)?;
        self.check_owner_references(&object)?;

        let mut state = self.state.write().await;
        let key = ObjectKey::of(&object);
        if state.objects.contains_key(&key) {
            return Err(StoreError::already_exists(
                key.kind,
                key.namespace,
                key.name,
            ));
        }

        object.metadata.uid = Some(Ulid::new().to_string());
        object.metadata.creation_timestamp = Some(Utc::now());
        object.metadata.resource_version = Some(state.next_version()?);

        state.objects.insert(key, object.clone());
        self.publish(WatchEventType::Added, &object);
        Ok(object)
    }

    async fn get(&self, kind: Kind, namespace: &str, name: &str) -> Result<RawObject> {
        self.take_fault(Operation::Get, kind).await?;
        let key = ObjectKey {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        self.state
            .read()
            .await
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(kind, namespace, name))
    }

    async fn list(
        &self,
        kind: Kind,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> Result<Vec<RawObject>> {
        self.take_fault(Operation::List, kind).await?;
        let selector = params.selector()?;
        let state = self.state.read().await;
        Ok(state
            .objects
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .filter(|(key, _)| namespace.is_none_or(|ns| key.namespace == ns))
            .filter(|(_, obj)| selector.matches(&obj.metadata.labels))
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn update(&self, object: RawObject) -> Result<RawObject> {
        self.take_fault(Operation::Update, object.kind).await?;
        let mut object = normalize(object)?;
        self.check_owner_references(&object)?;

        let mut state = self.state.write().await;
        let key = ObjectKey::of(&object);
        let current = state
            .objects
            .get(&key)
            .ok_or_else(|| StoreError::not_found(key.kind, &key.namespace, &key.name))?;

        let current_version = current.metadata.resource_version.clone().unwrap_or_default();
        if let Some(expected) = &object.metadata.resource_version {
            if *expected != current_version {
                return Err(StoreError::conflict(
                    key.kind,
                    key.namespace,
                    key.name,
                    expected.clone(),
                    current_version,
                ));
            }
        }

        object.metadata.uid.clone_from(&current.metadata.uid);
        object.metadata.creation_timestamp = current.metadata.creation_timestamp;
        object.metadata.resource_version = Some(state.next_version()?);

        state.objects.insert(key, object.clone());
        self.publish(WatchEventType::Modified, &object);
        Ok(object)
    }

    async fn delete(&self, kind: Kind, namespace: &str, name: &str) -> Result<RawObject> {
        self.take_fault(Operation::Delete, kind).await?;
        let key = ObjectKey {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        };

        let mut state = self.state.write().await;
        let mut object = state
            .objects
            .remove(&key)
            .ok_or_else(|| StoreError::not_found(kind, namespace, name))?;
        object.metadata.resource_version = Some(state.next_version()?);

        self.publish(WatchEventType::Deleted, &object);
        Ok(object)
    }

    fn subscribe(&self) -> broadcast::Receiver<RawWatchEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl SchemaRegistry for InMemoryStore {
    async fn register(&self, definitions: &[CustomResourceDefinition]) -> Result<()> {
        let failed = self
            .registration_failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::unavailable("schema registration rejected"));
        }

        let mut registered = self.definitions.write().await;
        for definition in definitions {
            registered.entry(definition.name.clone()).or_insert(0);
        }
        Ok(())
    }

    async fn is_established(&self, name: &str) -> Result<bool> {
        let mut registered = self.definitions.write().await;
        Ok(registered.get_mut(name).is_some_and(|polls| {
            let established = *polls >= self.establish_after_polls;
            *polls = polls.saturating_add(1);
            established
        }))
    }
}

/// Builder for [`InMemoryStore`].
pub struct InMemoryStoreBuilder {
    channel_capacity: usize,
    allow_owner_references: bool,
    establish_after_polls: u32,
    registration_failures: u32,
}

impl InMemoryStoreBuilder {
    /// Create a new builder.
    pub const fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            allow_owner_references: true,
            establish_after_polls: 0,
            registration_failures: 0,
        }
    }

    /// Set the broadcast channel capacity.
    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Refuse any object that carries owner references.
    #[must_use]
    pub const fn reject_owner_references(mut self) -> Self {
        self.allow_owner_references = false;
        self
    }

    /// Report registered kinds as not established for the first `polls` checks.
    #[must_use]
    pub const fn establish_after_polls(mut self, polls: u32) -> Self {
        self.establish_after_polls = polls;
        self
    }

    /// Fail the first `count` registration calls.
    #[must_use]
    pub const fn with_registration_failures(mut self, count: u32) -> Self {
        self.registration_failures = count;
        self
    }

    /// Build the store.
    pub fn build(self) -> InMemoryStore {
        let (events, _) = broadcast::channel(self.channel_capacity.max(1));
        InMemoryStore {
            state: RwLock::new(State::default()),
            events,
            faults: Mutex::new(Vec::new()),
            allow_owner_references: self.allow_owner_references,
            definitions: RwLock::new(HashMap::new()),
            establish_after_polls: self.establish_after_polls,
            registration_failures: AtomicU32::new(self.registration_failures),
        }
    }
}

impl Default for InMemoryStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
