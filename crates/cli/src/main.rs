//! kpf - Kubernetes port-forward CLI
//!
//! Lists namespaces and services discovered from running pods, and runs
//! port-forwards for services by short name until interrupted.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{discovery, forward};
use forward_lib::ForwardService;
use tracing_subscriber::EnvFilter;

/// Kubernetes port-forward helper
#[derive(Parser)]
#[command(name = "kpf")]
#[command(author, version, about = "Port-forward Kubernetes services by short name", long_about = None)]
pub struct Cli {
    /// kubectl binary to use (overrides the config file)
    #[arg(long, env = "KPF_KUBECTL")]
    pub kubectl: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List namespaces in the current context
    Namespaces,

    /// List services discovered from running pods
    Services {
        /// Only look in this namespace
        #[arg(long, short)]
        namespace: Option<String>,
    },

    /// Forward one or more services until interrupted
    Forward {
        /// Services as NAME:LOCAL_PORT[:REMOTE_PORT]
        #[arg(required = true)]
        targets: Vec<String>,

        /// Prefer the service in this namespace
        #[arg(long, short)]
        namespace: Option<String>,

        /// Prefer this environment (dev, qa, stg, prod)
        #[arg(long, short)]
        environment: Option<String>,

        /// Do not open log windows
        #[arg(long)]
        no_logs: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "debug"
    } else {
        "warn,forward_output=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::Config::load()?;
    let kubectl = cli
        .kubectl
        .or(config.kubectl.clone())
        .unwrap_or_else(|| "kubectl".to_string());

    let service = ForwardService::builder().kubectl(kubectl).build()?;

    match cli.command {
        Commands::Namespaces => {
            discovery::list_namespaces(&service, cli.format).await?;
        }
        Commands::Services { namespace } => {
            let namespace = namespace.or(config.default_namespace);
            discovery::list_services(&service, namespace.as_deref(), cli.format).await?;
        }
        Commands::Forward {
            targets,
            namespace,
            environment,
            no_logs,
        } => {
            let namespace = namespace.or(config.default_namespace);
            let requests = forward::build_requests(&targets, namespace, environment, !no_logs)?;
            forward::run(&service, &requests, cli.format).await?;
        }
    }

    Ok(())
}
