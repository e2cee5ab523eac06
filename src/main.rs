//! topoharness - data-driven integration-test harness for network
//! observability CLIs
//!
//! Provisions virtual network topologies, runs the poller against them,
//! captures the resulting dataset, and replays declarative fixture suites
//! against the capture.

use std::path::PathBuf;

use clap::Parser;
use topoharness::{cli, commands::Commands, common::logging};

#[derive(Parser)]
#[command(name = "topoharness", about = "Integration-test harness for network observability CLIs")]
#[command(version, long_about = None)]
struct Cli {
    /// Path to the harness configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    logging::init_cli();

    let cli = Cli::parse();

    if let Err(e) = cli::dispatch(cli.command, cli.config).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
