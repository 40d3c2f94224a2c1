//! Event to EventBinding synchronization.
//!
//! Each Event notification becomes one [`SubsetMutation`] applied to every
//! EventBinding in the Event's namespace whose labels satisfy the Event's
//! selector. Bindings are updated one at a time; each update is a
//! read-modify-write guarded by the binding's resource version and retried
//! on conflict up to a fixed number of attempts.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use itertools::Itertools;
use linebot_core::{Event, EventBinding, EventBindingSubset, LabelSelector, Resource};
use linebot_store::{Api, ListParams, ObjectStore};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::r#loop::Handler;

/// How an Event's subset is applied to a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubsetMutation {
    /// Add the subset unless an identical one is present. A differing subset
    /// from the same Event is replaced, so a binding never holds two.
    Insert,
    /// Drop any subset from the same Event and append the new one.
    Replace,
    /// Drop every subset from the Event.
    Remove,
}

impl SubsetMutation {
    /// Apply to `binding`. Returns whether `binding` needs to be written.
    pub fn apply(self, binding: &mut EventBinding, subset: &EventBindingSubset) -> bool {
        match self {
            Self::Insert => {
                if binding.contains(subset) {
                    return false;
                }
                binding.replace_subset(subset.clone());
                true
            }
            Self::Replace => {
                binding.replace_subset(subset.clone());
                true
            }
            Self::Remove => binding.remove_subset(subset.source()),
        }
    }
}

impl fmt::Display for SubsetMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Replace => write!(f, "replace"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Per-binding results of one sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Bindings written.
    pub updated: Vec<String>,
    /// Bindings that already matched, or disappeared before they could be written.
    pub unchanged: Vec<String>,
    /// Bindings whose write failed.
    pub failed: Vec<(String, Error)>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of bindings the selector matched.
    pub fn matched(&self) -> usize {
        self.updated
            .len()
            .saturating_add(self.unchanged.len())
            .saturating_add(self.failed.len())
    }
}

/// Applies Event mutations to matching EventBindings.
pub struct EventSync {
    store: Arc<dyn ObjectStore>,
    conflict_retries: u32,
}

enum Applied {
    Written,
    Unchanged,
}

impl EventSync {
    /// `conflict_retries` is the number of write attempts per binding; zero is treated as one.
    pub fn new(store: Arc<dyn ObjectStore>, conflict_retries: u32) -> Self {
        Self {
            store,
            conflict_retries: conflict_retries.max(1),
        }
    }

    /// Apply `mutation` for `event` to every matching binding.
    ///
    /// An Event without a selector matches nothing. One binding failing does
    /// not stop the others.
    ///
    /// # Errors
    ///
    /// Returns an error only if the matching bindings cannot be listed.
    pub async fn sync(&self, event: &Event, mutation: SubsetMutation) -> Result<SyncReport> {
        let Some(selector) = &event.spec.selector else {
            debug!(event = %event.name(), "Event has no selector; nothing to sync");
            return Ok(SyncReport::default());
        };

        let bindings: Api<EventBinding> =
            Api::namespaced(Arc::clone(&self.store), event.namespace());
        let matched = bindings.list(&ListParams::matching(selector)).await?;
        debug!(
            event = %event.name(),
            mutation = %mutation,
            bindings = %matched.iter().map(|b| b.metadata.name.as_str()).join(","),
            "Syncing event"
        );

        let subset = event.to_subset();
        let mut report = SyncReport::default();
        for binding in matched {
            let name = binding.metadata.name.clone();
            match self
                .apply_with_retry(&bindings, binding, selector, mutation, &subset)
                .await
            {
                Ok(Applied::Written) => report.updated.push(name),
                Ok(Applied::Unchanged) => report.unchanged.push(name),
                Err(e) => {
                    warn!(
                        event = %event.name(),
                        binding = %name,
                        error = %e,
                        "Binding update failed"
                    );
                    report.failed.push((name, e));
                }
            }
        }
        Ok(report)
    }

    async fn apply_with_retry(
        &self,
        bindings: &Api<EventBinding>,
        mut binding: EventBinding,
        selector: &LabelSelector,
        mutation: SubsetMutation,
        subset: &EventBindingSubset,
    ) -> Result<Applied> {
        let name = binding.metadata.name.clone();
        let mut attempt: u32 = 1;
        loop {
            if !mutation.apply(&mut binding, subset) {
                return Ok(Applied::Unchanged);
            }

            match bindings.update(&binding).await {
                Ok(_) => return Ok(Applied::Written),
                Err(e) if e.is_conflict() => {
                    if attempt >= self.conflict_retries {
                        return Err(Error::conflict_retries_exhausted(name, attempt));
                    }
                    debug!(binding = %name, attempt, "Conflict writing binding; re-reading");
                    attempt = attempt.saturating_add(1);
                }
                Err(e) => return Err(e.into()),
            }

            binding = match bindings.get(&name).await {
                Ok(fresh) => fresh,
                Err(e) if e.is_not_found() => return Ok(Applied::Unchanged),
                Err(e) => return Err(e.into()),
            };
            if !selector.matches(&binding.metadata.labels) {
                debug!(binding = %name, "Binding no longer matches; skipping");
                return Ok(Applied::Unchanged);
            }
        }
    }
}

/// Handler keeping EventBindings in step with Event notifications.
pub struct EventReconciler {
    sync: EventSync,
}

impl EventReconciler {
    pub fn new(sync: EventSync) -> Self {
        Self { sync }
    }

    async fn handle(&self, event: &Event, mutation: SubsetMutation) -> Result<()> {
        let report = self.sync.sync(event, mutation).await?;
        if report.matched() > 0 {
            info!(
                event = %event.name(),
                namespace = %event.namespace(),
                mutation = %mutation,
                updated = report.updated.len(),
                unchanged = report.unchanged.len(),
                failed = report.failed.len(),
                "Synced event to bindings"
            );
        }
        if report.is_clean() {
            Ok(())
        } else {
            Err(Error::sync_failed(event.name(), report.failed.len()))
        }
    }
}

#[async_trait]
impl Handler<Event> for EventReconciler {
    async fn on_added(&self, event: Event) -> Result<()> {
        self.handle(&event, SubsetMutation::Insert).await
    }

    async fn on_modified(&self, event: Event) -> Result<()> {
        self.handle(&event, SubsetMutation::Replace).await
    }

    async fn on_deleted(&self, event: Event) -> Result<()> {
        self.handle(&event, SubsetMutation::Remove).await
    }
}
