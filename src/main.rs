//! # linebot-operator
//!
//! ## Startup
//!
//! 1. **Configuration** - defaults, then the TOML file, then CLI flags
//! 2. **Store** - in-memory object store, seeded from `--manifests`
//! 3. **Supervisor** - establish custom kinds, then start the watch loops
//!
//! ## Shutdown
//!
//! SIGTERM/SIGINT stop every watch loop. In-flight handlers are dropped; a
//! restart picks their objects up again from the initial list.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use linebot_core::{DEFAULT_NAMESPACE, OperatorConfig};
use linebot_operator::manifest::{self, ManifestObject};
use linebot_operator::{Supervisor, install_signal_handlers};
use linebot_reconciler::render_children;
use linebot_store::{InMemoryStore, ObjectStore, TracingStore};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands, RunArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args, cli.log_filter).await,
        Commands::Render { manifest, config } => {
            render(&manifest, config.as_deref(), cli.log_filter)
        }
    }
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<OperatorConfig> {
    path.map_or_else(
        || Ok(OperatorConfig::default()),
        |p| {
            OperatorConfig::load(p)
                .with_context(|| format!("Failed to load config from {}", p.display()))
        },
    )
}

async fn run(args: RunArgs, log_filter: Option<String>) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(filter) = log_filter {
        config.log_filter = filter;
    }
    if args.namespace.is_some() {
        config.namespace = args.namespace;
    }
    config.skip_owner_references |= args.skip_owner_references;
    config.validate().context("Invalid operator configuration")?;

    init_tracing(&config.log_filter);
    info!(
        namespace = config.namespace.as_deref().unwrap_or("<all>"),
        "linebot-operator starting"
    );

    let backend = Arc::new(TracingStore::new(InMemoryStore::new()));
    let store: Arc<dyn ObjectStore> = backend.clone();

    let seed_namespace = config.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
    for path in &args.manifests {
        let objects = manifest::load(path)
            .with_context(|| format!("Failed to read manifests from {}", path.display()))?;
        manifest::apply(&store, objects, seed_namespace)
            .await
            .with_context(|| format!("Failed to apply manifests from {}", path.display()))?;
    }

    let supervisor = Supervisor::new(Arc::clone(&store), backend, config);
    let _signals = install_signal_handlers(supervisor.shutdown());
    let report = supervisor.run().await.context("Operator stopped with an error")?;
    info!(signal = %report.signal, "linebot-operator stopped");

    if args.dump {
        print!("{}", manifest::dump(&store).await.context("Failed to dump store")?);
    }
    Ok(())
}

fn render(path: &Path, config: Option<&Path>, log_filter: Option<String>) -> Result<()> {
    let config = load_config(config)?;
    init_tracing(log_filter.as_deref().unwrap_or(&config.log_filter));

    let objects = manifest::load(path)
        .with_context(|| format!("Failed to read manifests from {}", path.display()))?;
    let bots: Vec<_> = objects
        .into_iter()
        .filter_map(|object| match object {
            ManifestObject::Bot(bot) => Some(bot),
            ManifestObject::Event(_) | ManifestObject::EventBinding(_) => None,
        })
        .collect();
    if bots.is_empty() {
        bail!("{} contains no Bot", path.display());
    }

    let rendered = bots
        .iter()
        .map(|bot| manifest::render_children(&render_children(bot, &config)))
        .collect::<linebot_operator::Result<Vec<_>>>()?;
    print!("{}", rendered.join("---\n"));
    Ok(())
}
