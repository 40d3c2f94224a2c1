//! Reconciliation loops for the LINE bot operator.
//!
//! Three handlers, each fed by its own [`WatchLoop`]:
//!
//! - [`BotReconciler`]: provisions a Bot's ConfigMap, Service, Deployment and
//!   EventBinding, then marks the Bot `Active`
//! - [`EventReconciler`]: applies Event changes to every EventBinding the
//!   Event's selector matches
//! - [`EventBindingObserver`]: logs EventBinding changes
//!
//! Writes made by one handler come back as notifications to the others, and
//! notifications may be redelivered, so every handler is idempotent.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use linebot_core::{Bot, OperatorConfig};
//! use linebot_reconciler::{BotReconciler, OwnershipPolicy, ShutdownCoordinator, WatchLoop};
//! use linebot_store::{Api, InMemoryStore, ObjectStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store: Arc<dyn ObjectStore> = InMemoryStore::new_arc();
//!     let ownership = Arc::new(OwnershipPolicy::new(Arc::clone(&store)));
//!     let bots = Arc::new(BotReconciler::new(
//!         Arc::clone(&store),
//!         ownership,
//!         OperatorConfig::default(),
//!     ));
//!
//!     let shutdown = ShutdownCoordinator::new();
//!     let bot_loop = WatchLoop::new(Api::<Bot>::all(store), bots);
//!     tokio::spawn(bot_loop.run(shutdown.listener()));
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod binding;
pub mod error;
pub mod r#loop;
pub mod ownership;
pub mod provision;
pub mod shutdown;
pub mod sync;

// Re-export main types
pub use binding::EventBindingObserver;
pub use error::{Error, Result};
pub use ownership::{OwnerRefMode, OwnershipPolicy};
pub use provision::{
    BotReconciler, ChildObjects, ProvisionOutcome, ProvisionStep, render_children,
};
pub use r#loop::{Handler, LoopStats, WatchLoop};
pub use shutdown::{ShutdownCoordinator, ShutdownListener, ShutdownSignal};
pub use sync::{EventReconciler, EventSync, SubsetMutation, SyncReport};
