//! CLI command definitions
//!
//! Defines the clap commands for the harness CLI.

use clap::Subcommand;
use std::path::PathBuf;

use crate::topology::{Protocol, Topology};

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full topology matrix: provision, collect, evaluate
    Run {
        /// Directory containing the topology working directories
        topologies: PathBuf,

        /// Install directory of the tool under test (service and schema files)
        #[arg(long)]
        install_dir: PathBuf,

        /// Rewrite fixture outputs from observed results instead of asserting
        #[arg(long)]
        update_fixtures: bool,
    },

    /// Provision one topology combination and collect a dataset from it
    Collect {
        /// Directory containing the topology working directories
        topologies: PathBuf,

        /// Attachment kind to provision
        #[arg(long, value_enum)]
        topology: Topology,

        /// Routing protocol variant
        #[arg(long, value_enum)]
        protocol: Protocol,

        /// Scenario applied atop the topology
        #[arg(long)]
        scenario: String,

        /// Install directory of the tool under test
        #[arg(long)]
        install_dir: PathBuf,
    },

    /// Evaluate fixture cases against an existing dataset
    Eval {
        /// Fixture file or directory of fixture files
        fixtures: PathBuf,

        /// Dataset directory the cases read from
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Rewrite fixture outputs from freshly observed results
    Update {
        /// Directory of fixture files
        fixtures: PathBuf,

        /// Dataset directory the commands read from
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}
