use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(
    name = "flotilla",
    about = "Flotilla: deploy applications onto a fleet of testbed nodes",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Config file (default: ~/.flotilla.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Node group to operate on (overrides `group` in the config)
    #[arg(short, long, global = true)]
    group: Option<String>,
    /// Fleet directory file (overrides `directory` in the config)
    #[arg(long, global = true)]
    directory: Option<PathBuf>,
    /// Concurrent workers per phase (overrides `workers` in the config)
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the application at a git url onto the group
    Deploy(commands::deploy::DeployArgs),
    /// Classify the nodes of the group as healthy or faulty
    HealthCheck {
        /// Replace the group membership with the healthy nodes
        #[arg(long)]
        remove_faulty: bool,
        /// Write healthy nodes as `hostname,id` lines to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run a command on one node, streaming its output
    Execute {
        hostname: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Copy a local file to one node
    Transfer {
        hostname: String,
        local: PathBuf,
        remote: String,
    },
    /// List the nodes of the group
    ListNodes,
    /// Copy a script to nodes and run it
    Provision {
        script: PathBuf,
        /// Hostnames, or `all` for the whole group
        #[arg(required = true)]
        hosts: Vec<String>,
        #[arg(long)]
        sudo: bool,
    },
    /// Remove the app directory and stop every process on nodes
    Cleanup {
        /// Hostnames, or `all` for the whole group
        #[arg(required = true)]
        hosts: Vec<String>,
        #[arg(long)]
        app_path: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("flotilla=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let ctx = Context::load(
        cli.config.as_deref(),
        cli.group,
        cli.directory,
        cli.workers,
    )?;

    match cli.command {
        Commands::Deploy(args) => commands::deploy::deploy(&ctx, args).await,
        Commands::HealthCheck {
            remove_faulty,
            output,
        } => commands::health::health_check(&ctx, remove_faulty, output.as_deref()).await,
        Commands::Execute { hostname, command } => {
            commands::nodes::execute(&ctx, &hostname, &command.join(" ")).await
        }
        Commands::Transfer {
            hostname,
            local,
            remote,
        } => commands::nodes::transfer(&ctx, &hostname, &local, &remote).await,
        Commands::ListNodes => commands::nodes::list(&ctx).await,
        Commands::Provision {
            script,
            hosts,
            sudo,
        } => commands::maintenance::provision(&ctx, &script, &hosts, sudo).await,
        Commands::Cleanup { hosts, app_path } => {
            commands::maintenance::cleanup(&ctx, &hosts, app_path.as_deref()).await
        }
    }
}
