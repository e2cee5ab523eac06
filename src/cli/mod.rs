//! CLI command handling
//!
//! Dispatches subcommands onto the pipeline components and formats the
//! suite summary.

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;

use crate::cases::{self, Evaluator, RunContext};
use crate::collect::CollectionSession;
use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::runner::SystemRunner;
use crate::suite::{self, SuiteDriver, SuiteResult};
use crate::topology::TopologyDescriptor;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.programs = config.programs.resolved();
    let runner = Arc::new(SystemRunner);

    match command {
        Commands::Run {
            topologies,
            install_dir,
            update_fixtures,
        } => {
            let driver = SuiteDriver::new(runner, config);
            let result = driver
                .run(&topologies, &install_dir, update_fixtures)
                .await?;
            print_summary(&result);
            suite_exit(&result)
        }

        Commands::Collect {
            topologies,
            topology,
            protocol,
            scenario,
            install_dir,
        } => {
            let session = CollectionSession::new(runner, config);
            let desc = TopologyDescriptor::new(topology, protocol, scenario);
            let collection = session.collect(&desc, &topologies, &install_dir).await?;

            println!(
                "Dataset captured at {}",
                collection.dataset.path().display()
            );
            println!("Run config: {}", collection.config_file.display());
            Ok(())
        }

        Commands::Eval { fixtures, data_dir } => {
            let evaluator = Evaluator::new(runner);
            let ctx = run_context(&config, data_dir)?;
            let (passed, failed) = suite::evaluate_fixtures(&evaluator, &fixtures, &ctx).await?;

            println!("\n{} passed, {} failed", passed, failed);
            if failed == 0 {
                Ok(())
            } else {
                Err(Error::SuiteFailed {
                    failed,
                    total: passed + failed,
                })
            }
        }

        Commands::Update { fixtures, data_dir } => {
            let evaluator = Evaluator::new(runner);
            let ctx = run_context(&config, data_dir)?;
            let rewritten = cases::update_fixtures(&evaluator, &fixtures, &ctx).await?;

            println!("{} fixture outputs rewritten", rewritten);
            Ok(())
        }
    }
}

fn run_context(config: &Config, data_dir: Option<PathBuf>) -> Result<RunContext> {
    Ok(RunContext {
        cli: config.programs.cli.clone(),
        config_file: Some(config.suite.base_config.clone()),
        data_directory: data_dir,
        work_dir: std::env::current_dir()?,
    })
}

fn print_summary(result: &SuiteResult) {
    println!();
    for iteration in &result.iterations {
        match &iteration.aborted {
            Some(reason) => {
                println!("{} {}: aborted: {}", "✗".red(), iteration.run_name, reason);
            }
            None => {
                let mark = if iteration.cases_failed == 0 {
                    "✓".green()
                } else {
                    "✗".red()
                };
                println!(
                    "{} {}: {} passed, {} failed",
                    mark, iteration.run_name, iteration.cases_passed, iteration.cases_failed
                );
            }
        }
    }
}

fn suite_exit(result: &SuiteResult) -> Result<()> {
    let aborted = result
        .iterations
        .iter()
        .filter(|it| it.aborted.is_some())
        .count();
    if aborted > 0 {
        return Err(Error::SuiteAborted {
            aborted,
            total: result.iterations.len(),
        });
    }
    if result.cases_failed() > 0 {
        return Err(Error::SuiteFailed {
            failed: result.cases_failed(),
            total: result.cases_failed() + result.cases_passed(),
        });
    }
    Ok(())
}
