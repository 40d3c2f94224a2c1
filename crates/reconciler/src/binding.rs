//! EventBinding observer.

use async_trait::async_trait;
use itertools::Itertools;
use linebot_core::{EventBinding, Resource};
use tracing::info;

use crate::error::Result;
use crate::r#loop::Handler;

/// Logs EventBinding changes. Performs no writes.
#[derive(Debug, Default)]
pub struct EventBindingObserver;

impl EventBindingObserver {
    pub const fn new() -> Self {
        Self
    }
}

fn sources(binding: &EventBinding) -> String {
    binding.subsets.iter().map(|s| s.source()).join(",")
}

#[async_trait]
impl Handler<EventBinding> for EventBindingObserver {
    async fn on_added(&self, binding: EventBinding) -> Result<()> {
        info!(
            binding = %binding.name(),
            namespace = %binding.namespace(),
            subsets = %sources(&binding),
            "EventBinding added"
        );
        Ok(())
    }

    async fn on_modified(&self, binding: EventBinding) -> Result<()> {
        info!(
            binding = %binding.name(),
            namespace = %binding.namespace(),
            subsets = %sources(&binding),
            "EventBinding updated"
        );
        Ok(())
    }

    async fn on_deleted(&self, binding: EventBinding) -> Result<()> {
        info!(
            binding = %binding.name(),
            namespace = %binding.namespace(),
            "EventBinding deleted"
        );
        Ok(())
    }
}
