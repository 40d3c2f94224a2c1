//! Process supervisor.
//!
//! Startup runs in two phases. Schema establishment registers the custom
//! kinds and waits until the orchestrator reports each one as established,
//! retrying the whole step until it succeeds or shutdown is requested. Then
//! one [`WatchLoop`] per kind is spawned and the supervisor parks until the
//! shutdown signal arrives. Handlers still running at that point are dropped.

use std::sync::Arc;

use linebot_core::{Bot, Event, EventBinding, Kind, OperatorConfig};
use linebot_reconciler::{
    BotReconciler, EventBindingObserver, EventReconciler, EventSync, LoopStats, OwnershipPolicy,
    ShutdownCoordinator, ShutdownSignal, WatchLoop,
};
use linebot_store::{Api, CustomResourceDefinition, ObjectStore, SchemaRegistry};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

type LoopExit = (Kind, linebot_reconciler::Result<LoopStats>);

/// How a supervised run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorReport {
    pub signal: ShutdownSignal,
    /// Per-kind counters of the loops that stopped cleanly.
    pub loops: Vec<(Kind, LoopStats)>,
}

pub struct Supervisor {
    store: Arc<dyn ObjectStore>,
    schema: Arc<dyn SchemaRegistry>,
    config: OperatorConfig,
    shutdown: Arc<ShutdownCoordinator>,
}

impl Supervisor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        schema: Arc<dyn SchemaRegistry>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            store,
            schema,
            config,
            shutdown: Arc::new(ShutdownCoordinator::new()),
        }
    }

    /// Coordinator that stops this supervisor.
    pub fn shutdown(&self) -> Arc<ShutdownCoordinator> {
        Arc::clone(&self.shutdown)
    }

    /// Register the custom kinds and wait for all of them to be established.
    ///
    /// # Errors
    ///
    /// Returns the registry's error, or [`Error::SchemaTimeout`] naming the
    /// first kind that was not established within the configured timeout.
    pub async fn establish_schema(&self) -> Result<()> {
        let definitions = CustomResourceDefinition::operator_kinds();
        self.schema.register(&definitions).await?;

        let timeout = self.config.establish_timeout();
        for definition in &definitions {
            tokio::time::timeout(timeout, self.wait_established(&definition.name))
                .await
                .map_err(|_| Error::schema_timeout(&definition.name, timeout))??;
            debug!(crd = %definition.name, "Custom resource established");
        }
        Ok(())
    }

    async fn wait_established(&self, name: &str) -> Result<()> {
        let mut interval = tokio::time::interval(self.config.establish_interval());
        loop {
            interval.tick().await;
            if self.schema.is_established(name).await? {
                return Ok(());
            }
        }
    }

    /// Retry [`Supervisor::establish_schema`] every `init_retry_delay`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interrupted`] if shutdown is requested first.
    pub async fn initialize(&self) -> Result<()> {
        let mut shutdown = self.shutdown.listener();
        let mut attempt: u32 = 1;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = shutdown.recv() => return Err(Error::Interrupted),
                outcome = self.establish_schema() => outcome,
            };

            match outcome {
                Ok(()) => {
                    info!(attempt, "Custom resources established");
                    return Ok(());
                }
                Err(e) => warn!(
                    attempt,
                    error = %e,
                    retry_in = ?self.config.init_retry_delay(),
                    "Custom resource setup failed"
                ),
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => return Err(Error::Interrupted),
                () = tokio::time::sleep(self.config.init_retry_delay()) => {}
            }
            attempt = attempt.saturating_add(1);
        }
    }

    fn ownership(&self) -> OwnershipPolicy {
        if self.config.skip_owner_references {
            OwnershipPolicy::disabled()
        } else {
            OwnershipPolicy::new(Arc::clone(&self.store))
        }
    }

    fn spawn_loops(&self) -> JoinSet<LoopExit> {
        let namespace = self.config.namespace.as_deref();
        let store = &self.store;

        let bots = Arc::new(BotReconciler::new(
            Arc::clone(store),
            Arc::new(self.ownership()),
            self.config.clone(),
        ));
        let events = Arc::new(EventReconciler::new(EventSync::new(
            Arc::clone(store),
            self.config.conflict_retries,
        )));

        let mut tasks = JoinSet::new();
        let bot_loop = WatchLoop::new(Api::<Bot>::scoped(Arc::clone(store), namespace), bots);
        let listener = self.shutdown.listener();
        tasks.spawn(async move { (Kind::Bot, bot_loop.run(listener).await) });

        let event_loop =
            WatchLoop::new(Api::<Event>::scoped(Arc::clone(store), namespace), events);
        let listener = self.shutdown.listener();
        tasks.spawn(async move { (Kind::Event, event_loop.run(listener).await) });

        let binding_loop = WatchLoop::new(
            Api::<EventBinding>::scoped(Arc::clone(store), namespace),
            Arc::new(EventBindingObserver::new()),
        );
        let listener = self.shutdown.listener();
        tasks.spawn(async move { (Kind::EventBinding, binding_loop.run(listener).await) });

        info!(
            namespace = namespace.unwrap_or("<all>"),
            "Watch loops started"
        );
        tasks
    }

    /// Establish the schema, run the watch loops and wait for shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interrupted`] when shutdown arrives before the schema
    /// is established.
    pub async fn run(self) -> Result<SupervisorReport> {
        self.initialize().await?;

        let mut tasks = self.spawn_loops();
        let mut shutdown = self.shutdown.listener();
        let signal = loop {
            tokio::select! {
                biased;
                signal = shutdown.recv() => break signal,
                Some(joined) = tasks.join_next() => log_early_exit(joined),
            }
        };
        info!(signal = %signal, "Stopping watch loops");

        let mut loops = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((kind, Ok(stats))) => {
                    info!(
                        kind = %kind,
                        received = stats.received,
                        failed = stats.failed,
                        "Watch loop stopped"
                    );
                    loops.push((kind, stats));
                }
                other => log_early_exit(other),
            }
        }
        loops.sort_by_key(|(kind, _)| *kind);
        Ok(SupervisorReport { signal, loops })
    }
}

fn log_early_exit(joined: std::result::Result<LoopExit, JoinError>) {
    match joined {
        Ok((kind, Ok(_))) => warn!(kind = %kind, "Watch loop exited before shutdown"),
        Ok((kind, Err(e))) => error!(kind = %kind, error = %e, "Watch loop failed"),
        Err(e) => error!(error = %e, "Watch loop task aborted"),
    }
}

/// Install OS signal handlers (SIGTERM, SIGINT).
pub fn install_signal_handlers(coordinator: Arc<ShutdownCoordinator>) -> JoinHandle<()> {
    info!("Installing OS signal handlers");

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler");
                    return;
                }
            };

            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "Failed to install SIGINT handler");
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                    coordinator.initiate_shutdown(ShutdownSignal::Sigterm);
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT");
                    coordinator.initiate_shutdown(ShutdownSignal::Sigint);
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
                return;
            }

            info!("Received Ctrl+C");
            coordinator.initiate_shutdown(ShutdownSignal::Sigint);
        }
    })
}
