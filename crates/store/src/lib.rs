//! Object store contract for the LINE bot operator.
//!
//! This crate provides the operator's view of the orchestrator's object store:
//!
//! - **Store trait**: single-object create/get/list/update/delete plus a change feed
//! - **Typed api**: [`Api`] converts between typed resources and stored objects
//! - **Watch streams**: ordered [`WatchEvent`]s per kind, existing objects first
//! - **Schema registry**: registration and establishment of custom kinds
//! - **In-memory backend**: resource versions, conflict detection and fault injection
//!
//! # Example
//!
//! ```ignore
//! use linebot_core::{EventBinding, ObjectMeta};
//! use linebot_store::{Api, InMemoryStore, ObjectStore, WatchEvent};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store: Arc<dyn ObjectStore> = InMemoryStore::new_arc();
//!     let bindings: Api<EventBinding> = Api::namespaced(store, "default");
//!
//!     let mut stream = bindings.watch().await.unwrap();
//!     bindings
//!         .create(&EventBinding::new(ObjectMeta::new("b1", "default")))
//!         .await
//!         .unwrap();
//!
//!     if let Some(WatchEvent::Added(binding)) = stream.next().await {
//!         println!("added {}", binding.metadata.name);
//!     }
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod api;
pub mod error;
pub mod memory;
pub mod object;
pub mod schema;
pub mod store;
pub mod watch;

// Re-export main types
pub use api::Api;
pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryStoreBuilder, Operation};
pub use object::{ListParams, RawObject};
pub use schema::{CustomResourceDefinition, SchemaRegistry};
pub use store::{ObjectStore, TracingStore};
pub use watch::{RawWatchEvent, WatchEvent, WatchEventType, WatchStream};
