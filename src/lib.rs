//! # linebot-operator
//!
//! Operator process for LINE bots: establishes the `line.you` custom kinds,
//! then runs the Bot, Event and EventBinding watch loops until shutdown.
//!
//! The reconcilers live in [`linebot_reconciler`]; this crate wires them to a
//! store, handles OS signals and reads YAML manifests for local runs.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod manifest;
pub mod supervisor;

pub use error::{Error, Result};
pub use manifest::{ApplySummary, ManifestObject};
pub use supervisor::{Supervisor, SupervisorReport, install_signal_handlers};
