//! Quad-Fusion CLI
//!
//! Operational tools around the quad-fusion engine.
//!
//! # Commands
//!
//! - `index build`: build an HNSW snapshot from a JSONL vector file
//! - `index query`: query a snapshot with an inline vector
//! - `index stats`: print size and configuration of a snapshot
//! - `search`: run a unified search over in-memory stores seeded from a
//!   JSON file

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

/// Quad-Fusion - federated retrieval engine tools
#[derive(Parser)]
#[command(name = "quad-fusion")]
#[command(version = "0.1.0")]
#[command(about = "Index snapshots and unified search demos for quad-fusion")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Vector index snapshot commands
    Index {
        #[command(subcommand)]
        action: commands::index::IndexCommands,
    },
    /// Run a unified search against seeded in-memory stores
    Search(commands::search::SearchArgs),
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("quad_fusion={level},quad_fusion_core={level}")));
    fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Index { action } => commands::index::run(action),
        Commands::Search(args) => commands::search::run(args).await,
    }
}
