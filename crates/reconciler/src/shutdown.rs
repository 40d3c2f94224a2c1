//! Shutdown coordination for the watch loops.
//!
//! One coordinator per process. Every loop holds a [`ShutdownListener`] and
//! stops as soon as a signal is broadcast; in-flight work is dropped, not drained.

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Shutdown signal types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownSignal {
    /// SIGTERM signal received
    Sigterm,
    /// SIGINT signal received (Ctrl+C)
    Sigint,
    /// Programmatic shutdown requested
    Programmatic,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sigterm => write!(f, "SIGTERM"),
            Self::Sigint => write!(f, "SIGINT"),
            Self::Programmatic => write!(f, "PROGRAMMATIC"),
        }
    }
}

/// Broadcasts a single process-wide stop signal.
pub struct ShutdownCoordinator {
    signal: Arc<OnceLock<ShutdownSignal>>,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            signal: Arc::new(OnceLock::new()),
            shutdown_tx,
        }
    }

    /// Check if shutdown has been initiated
    pub fn is_shutdown_initiated(&self) -> bool {
        self.signal.get().is_some()
    }

    /// The signal that started shutdown, if any.
    pub fn signal(&self) -> Option<ShutdownSignal> {
        self.signal.get().copied()
    }

    /// Listener for one loop. Sees the signal even if it was sent before this call.
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            signal: Arc::clone(&self.signal),
            receiver: self.shutdown_tx.subscribe(),
        }
    }

    /// Initiate shutdown. Later signals are ignored.
    pub fn initiate_shutdown(&self, signal: ShutdownSignal) {
        if self.signal.set(signal).is_err() {
            info!("Shutdown already in progress, ignoring duplicate signal");
            return;
        }

        info!(
            signal = %signal,
            subscribers = self.shutdown_tx.receiver_count(),
            "Initiating shutdown"
        );
        if let Err(e) = self.shutdown_tx.send(signal) {
            debug!("No active subscribers for shutdown signal: {}", e);
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of the shutdown broadcast.
pub struct ShutdownListener {
    signal: Arc<OnceLock<ShutdownSignal>>,
    receiver: broadcast::Receiver<ShutdownSignal>,
}

impl ShutdownListener {
    pub fn is_shutdown(&self) -> bool {
        self.signal.get().is_some()
    }

    /// Wait for the shutdown signal. Cancel-safe.
    ///
    /// A dropped coordinator counts as a programmatic shutdown.
    pub async fn recv(&mut self) -> ShutdownSignal {
        if let Some(signal) = self.signal.get() {
            return *signal;
        }
        match self.receiver.recv().await {
            Ok(signal) => signal,
            Err(_) => self
                .signal
                .get()
                .copied()
                .unwrap_or(ShutdownSignal::Programmatic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listener_receives_signal() {
        let coordinator = ShutdownCoordinator::new();
        let mut listener = coordinator.listener();

        coordinator.initiate_shutdown(ShutdownSignal::Sigterm);
        assert_eq!(listener.recv().await, ShutdownSignal::Sigterm);
        assert!(listener.is_shutdown());
    }

    #[tokio::test]
    async fn test_late_listener_still_sees_signal() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown(ShutdownSignal::Sigint);

        let mut listener = coordinator.listener();
        assert_eq!(listener.recv().await, ShutdownSignal::Sigint);
    }

    #[tokio::test]
    async fn test_duplicate_shutdown_ignored() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown(ShutdownSignal::Programmatic);
        coordinator.initiate_shutdown(ShutdownSignal::Sigterm);

        assert!(coordinator.is_shutdown_initiated());
        assert_eq!(coordinator.signal(), Some(ShutdownSignal::Programmatic));
    }

    #[tokio::test]
    async fn test_dropped_coordinator_stops_listeners() {
        let coordinator = ShutdownCoordinator::new();
        let mut listener = coordinator.listener();
        drop(coordinator);

        assert_eq!(listener.recv().await, ShutdownSignal::Programmatic);
    }

    #[test]
    fn test_shutdown_signal_display() {
        assert_eq!(ShutdownSignal::Sigterm.to_string(), "SIGTERM");
        assert_eq!(ShutdownSignal::Sigint.to_string(), "SIGINT");
        assert_eq!(ShutdownSignal::Programmatic.to_string(), "PROGRAMMATIC");
    }
}
