mod addressing;
mod commands;
mod config;
mod error;
mod node_plan;
mod render;
mod units;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "nodeseed",
    version,
    about = "Generate cloud-init seeds and virt-install scripts for batches of statically-addressed VM nodes"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate per-node cloud-init files and virt-install scripts
    Generate {
        #[command(flatten)]
        opts: commands::generate::GenerateOpts,
    },

    /// Show the address plan without writing anything
    Plan {
        #[command(flatten)]
        opts: commands::plan::PlanOpts,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { opts } => commands::generate::run(opts),
        Commands::Plan { opts } => commands::plan::run(opts),
    }
}
