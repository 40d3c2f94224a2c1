//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// linebot-operator - LINE bot provisioning operator
#[derive(Parser, Debug)]
#[command(name = "linebot-operator")]
#[command(version)]
#[command(about = "Provisions LINE bot workloads and keeps their event bindings in sync")]
#[command(
    long_about = "Watches Bot, Event and EventBinding resources. Each Bot gets a ConfigMap, \
                  Service, Deployment and EventBinding; Event rules are copied into every \
                  EventBinding their selector matches."
)]
pub struct Cli {
    /// Log filter directive, used when RUST_LOG is unset (overrides the config file)
    #[arg(long, global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the operator until SIGINT or SIGTERM
    Run(RunArgs),

    /// Print the objects a Bot would be provisioned with
    Render {
        /// Manifest containing one or more Bots
        manifest: PathBuf,

        /// Operator config file (images, service account)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Operator config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// YAML manifests applied to the store before the loops start
    #[arg(short, long)]
    pub manifests: Vec<PathBuf>,

    /// Namespace to watch (default: all namespaces)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Never set owner references on provisioned objects
    #[arg(long, default_value_t = false)]
    pub skip_owner_references: bool,

    /// Print every stored object as YAML after shutdown
    #[arg(long, default_value_t = false)]
    pub dump: bool,
}
