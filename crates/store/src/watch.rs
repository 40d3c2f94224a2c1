//! Typed, ordered change notifications.

use std::collections::VecDeque;
use std::sync::Arc;

use linebot_core::{Kind, Resource};
use tokio::sync::broadcast;
use tracing::warn;

use crate::object::{ListParams, RawObject};
use crate::store::ObjectStore;

/// What happened to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
}

/// A change to a stored object as broadcast by a store.
#[derive(Debug, Clone)]
pub struct RawWatchEvent {
    pub event_type: WatchEventType,
    pub object: RawObject,
}

impl RawWatchEvent {
    pub const fn new(event_type: WatchEventType, object: RawObject) -> Self {
        Self { event_type, object }
    }
}

/// A change to a typed object.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<R> {
    Added(R),
    Modified(R),
    Deleted(R),
}

impl<R: Resource> WatchEvent<R> {
    /// The object the notification carries.
    pub const fn object(&self) -> &R {
        match self {
            Self::Added(obj) | Self::Modified(obj) | Self::Deleted(obj) => obj,
        }
    }

    pub const fn event_type(&self) -> WatchEventType {
        match self {
            Self::Added(_) => WatchEventType::Added,
            Self::Modified(_) => WatchEventType::Modified,
            Self::Deleted(_) => WatchEventType::Deleted,
        }
    }
}

/// Stream of notifications for one kind, optionally scoped to a namespace.
///
/// Objects that already exist when the stream is opened are delivered first as
/// [`WatchEvent::Added`]. Because the subscription is taken before the initial
/// list, an object created in between may be announced twice; consumers must
/// tolerate redelivery.
///
/// A stream that falls behind the store's channel re-lists its kind and
/// replays every current object as [`WatchEvent::Modified`] before reading on.
/// Deletions missed while lagging are not replayed.
pub struct WatchStream<R> {
    pending: VecDeque<WatchEvent<R>>,
    store: Arc<dyn ObjectStore>,
    receiver: broadcast::Receiver<RawWatchEvent>,
    namespace: Option<String>,
}

impl<R: Resource> WatchStream<R> {
    pub(crate) fn new(
        initial: Vec<R>,
        store: Arc<dyn ObjectStore>,
        receiver: broadcast::Receiver<RawWatchEvent>,
        namespace: Option<String>,
    ) -> Self {
        Self {
            pending: initial.into_iter().map(WatchEvent::Added).collect(),
            store,
            receiver,
            namespace,
        }
    }

    /// Receive the next notification, or `None` once the store is gone.
    pub async fn next(&mut self) -> Option<WatchEvent<R>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }

            match self.receiver.recv().await {
                Ok(raw) => {
                    if let Some(event) = self.accept(raw) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(kind = %R::KIND, missed, "Watch fell behind; re-listing");
                    self.resync().await;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn resync(&mut self) {
        let listed = self
            .store
            .list(R::KIND, self.namespace.as_deref(), &ListParams::default())
            .await;
        let objects = match listed {
            Ok(objects) => objects,
            Err(e) => {
                warn!(kind = %R::KIND, error = %e, "Re-list after lag failed");
                return;
            }
        };
        for raw in objects {
            let name = raw.name().to_string();
            match raw.into_resource::<R>() {
                Ok(obj) => self.pending.push_back(WatchEvent::Modified(obj)),
                Err(e) => warn!(
                    kind = %R::KIND,
                    name = %name,
                    error = %e,
                    "Skipping undecodable object"
                ),
            }
        }
    }

    fn accept(&self, raw: RawWatchEvent) -> Option<WatchEvent<R>> {
        if raw.object.kind != R::KIND {
            return None;
        }
        if let Some(ns) = &self.namespace {
            if raw.object.namespace() != ns {
                return None;
            }
        }

        let event_type = raw.event_type;
        let name = raw.object.name().to_string();
        match raw.object.into_resource::<R>() {
            Ok(obj) => Some(match event_type {
                WatchEventType::Added => WatchEvent::Added(obj),
                WatchEventType::Modified => WatchEvent::Modified(obj),
                WatchEventType::Deleted => WatchEvent::Deleted(obj),
            }),
            Err(e) => {
                warn!(kind = %R::KIND, name = %name, error = %e, "Skipping undecodable object");
                None
            }
        }
    }

    /// Kind carried by this stream.
    pub const fn kind(&self) -> Kind {
        R::KIND
    }
}
