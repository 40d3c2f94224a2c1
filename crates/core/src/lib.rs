//! Resource model for the LINE bot operator.
//!
//! This crate holds the records the operator reads and writes:
//!
//! - **Custom resources**: [`Bot`], [`Event`] and [`EventBinding`]
//! - **Provisioned objects**: [`ConfigMap`], [`Service`] and [`Deployment`]
//! - **Metadata**: [`ObjectMeta`] and [`OwnerReference`]
//! - **Selectors**: [`LabelSelector`] as written in specs, [`Selector`] as parsed by stores
//! - **Configuration**: [`OperatorConfig`]
//!
//! Every record implements [`Resource`], which ties it to a [`Kind`] and gives
//! stores uniform access to its metadata.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod binding;
pub mod bot;
pub mod config;
pub mod error;
pub mod event;
pub mod kind;
pub mod meta;
pub mod selector;
pub mod workload;

// Re-export main types
pub use binding::{Binding, EventBinding, EventBindingSubset};
pub use bot::{Bot, BotExpose, BotExposeType, BotPhase, BotSpec, BotStatus};
pub use config::OperatorConfig;
pub use error::{Error, Result};
pub use event::{Event, EventSpec, Message};
pub use kind::{Kind, Resource};
pub use meta::{DEFAULT_NAMESPACE, ObjectMeta, OwnerReference};
pub use selector::{LabelSelector, Selector};
pub use workload::{ConfigMap, Deployment, Service};
