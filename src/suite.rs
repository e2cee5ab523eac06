//! Suite driving
//!
//! Iterates the topology matrix sequentially: collect a dataset, install it
//! under the namespaced root, then replay the run's fixtures against it (or
//! rewrite them in update mode). Iterations never overlap in time, so the
//! namespaced dataset directories need no locking; a failed iteration never
//! takes the rest of the suite down.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use tracing::{info, warn};

use crate::cases::{self, CaseRecord, Evaluator, RunContext, Verdict};
use crate::collect::{CollectionSession, DATA_SUBDIR};
use crate::common::config::Config;
use crate::common::Result;
use crate::runner::CommandRunner;
use crate::topology::TopologyDescriptor;

/// Result of one topology iteration
#[derive(Debug)]
pub struct IterationResult {
    pub run_name: String,
    pub cases_passed: usize,
    pub cases_failed: usize,
    /// Provisioning or collection abort, when the iteration never reached
    /// its cases
    pub aborted: Option<String>,
}

impl IterationResult {
    fn aborted(run_name: String, reason: String) -> Self {
        Self {
            run_name,
            cases_passed: 0,
            cases_failed: 0,
            aborted: Some(reason),
        }
    }
}

/// Aggregated result of a suite run
#[derive(Debug)]
pub struct SuiteResult {
    pub iterations: Vec<IterationResult>,
}

impl SuiteResult {
    pub fn cases_passed(&self) -> usize {
        self.iterations.iter().map(|it| it.cases_passed).sum()
    }

    pub fn cases_failed(&self) -> usize {
        self.iterations.iter().map(|it| it.cases_failed).sum()
    }

    pub fn passed(&self) -> bool {
        self.cases_failed() == 0 && self.iterations.iter().all(|it| it.aborted.is_none())
    }
}

pub struct SuiteDriver {
    config: Config,
    session: CollectionSession,
    evaluator: Evaluator,
}

impl SuiteDriver {
    pub fn new(runner: Arc<dyn CommandRunner>, config: Config) -> Self {
        let session = CollectionSession::new(runner.clone(), config.clone());
        let evaluator = Evaluator::new(runner);
        Self {
            config,
            session,
            evaluator,
        }
    }

    /// Run every matrix combination in order.
    ///
    /// Provisioning and collection failures abort only their own
    /// iteration; the matrix keeps going.
    pub async fn run(
        &self,
        topologies_root: &Path,
        install_dir: &Path,
        update: bool,
    ) -> Result<SuiteResult> {
        let mut iterations = Vec::new();

        for entry in &self.config.suite.matrix {
            let desc = entry.descriptor();
            let run_name = desc.run_name();
            info!(run = %run_name, "starting topology iteration");

            match self
                .run_iteration(&desc, topologies_root, install_dir, update)
                .await
            {
                Ok(result) => iterations.push(result),
                Err(e) => {
                    warn!(run = %run_name, error = %e, "iteration aborted");
                    iterations.push(IterationResult::aborted(run_name, e.to_string()));
                }
            }
        }

        Ok(SuiteResult { iterations })
    }

    async fn run_iteration(
        &self,
        desc: &TopologyDescriptor,
        topologies_root: &Path,
        install_dir: &Path,
        update: bool,
    ) -> Result<IterationResult> {
        let run_name = desc.run_name();
        let collection = self
            .session
            .collect(desc, topologies_root, install_dir)
            .await?;

        // install the capture under its run name so iterations never
        // overwrite each other
        let run_area = self.config.suite.dataset_root.join(&run_name);
        let dataset = run_area.join(DATA_SUBDIR);
        copy_tree(collection.dataset.path(), &dataset)?;

        let outcome = self.run_cases(&run_name, &dataset, update).await;

        // group finalizer: the namespaced area goes away however the
        // cases went
        if let Err(e) = fs::remove_dir_all(&run_area) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(area = %run_area.display(), error = %e, "failed to remove dataset area");
            }
        }

        outcome
    }

    async fn run_cases(
        &self,
        run_name: &str,
        dataset: &Path,
        update: bool,
    ) -> Result<IterationResult> {
        let samples = self.config.suite.samples_dir.join(run_name);
        let ctx = RunContext {
            cli: self.config.programs.cli.clone(),
            config_file: Some(self.config.suite.base_config.clone()),
            data_directory: Some(dataset.to_path_buf()),
            work_dir: std::env::current_dir()?,
        };

        if update {
            let rewritten = cases::update_fixtures(&self.evaluator, &samples, &ctx).await?;
            info!(run = run_name, rewritten, "fixtures updated");
            return Ok(IterationResult {
                run_name: run_name.to_string(),
                cases_passed: 0,
                cases_failed: 0,
                aborted: None,
            });
        }

        let (cases_passed, cases_failed) =
            evaluate_fixtures(&self.evaluator, &samples, &ctx).await?;
        Ok(IterationResult {
            run_name: run_name.to_string(),
            cases_passed,
            cases_failed,
            aborted: None,
        })
    }
}

/// Evaluate every fixture at `fixtures` (a file or a directory of files)
/// under the context, reporting each verdict
pub async fn evaluate_fixtures(
    evaluator: &Evaluator,
    fixtures: &Path,
    ctx: &RunContext,
) -> Result<(usize, usize)> {
    let groups = if fixtures.is_file() {
        vec![(fixtures.to_path_buf(), cases::load_fixture(fixtures)?)]
    } else {
        cases::load_dir(fixtures)?
    };

    let mut passed = 0;
    let mut failed = 0;
    for (path, records) in groups {
        for record in &records {
            let verdict = evaluator.evaluate(record, ctx).await?;
            report_case(&path, record, &verdict);
            if verdict.passed {
                passed += 1;
            } else {
                failed += 1;
            }
        }
    }
    Ok((passed, failed))
}

/// Every failure prints the captured raw text so a human can diagnose
/// without re-running
fn report_case(path: &Path, record: &CaseRecord, verdict: &Verdict) {
    if verdict.passed {
        println!("  {} {}", "✓".green(), record.command.dimmed());
    } else {
        println!("  {} {} [{:?}]", "✗".red(), record.command, verdict.kind);
        if let Some(expected) = &verdict.expected {
            println!("    expected: {expected}");
        }
        if let Some(observed) = &verdict.observed {
            println!("    observed: {observed}");
        }
        println!("    fixture: {}", path.display().to_string().dimmed());
    }
}

/// Recursive copy that merges into an existing destination tree
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let to: PathBuf = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &to)?;
        } else {
            fs::copy(entry.path(), &to)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testutil::FakeRunner;
    use crate::runner::CmdOutput;

    #[test]
    fn test_copy_tree_merges_into_existing_destination() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        fs::create_dir_all(src.path().join("bgp")).unwrap();
        fs::write(src.path().join("bgp/part-0"), "fresh").unwrap();
        fs::create_dir_all(dst.path().join("ospf")).unwrap();
        fs::write(dst.path().join("ospf/part-0"), "old").unwrap();

        copy_tree(src.path(), dst.path()).unwrap();

        assert_eq!(fs::read_to_string(dst.path().join("bgp/part-0")).unwrap(), "fresh");
        assert_eq!(fs::read_to_string(dst.path().join("ospf/part-0")).unwrap(), "old");
    }

    /// Full driver pass over a one-entry matrix with a healthy fake lab
    #[tokio::test]
    async fn test_suite_run_evaluates_and_finalizes_dataset_area() {
        let root = tempfile::tempdir().unwrap();
        let topologies = root.path().join("topologies");
        fs::create_dir_all(topologies.join("dual-attach/bgp")).unwrap();
        // the "capture" the poller would have produced
        fs::create_dir_all(topologies.join("dual-attach/parquet-out")).unwrap();
        fs::write(topologies.join("dual-attach/parquet-out/part-0"), "rows").unwrap();

        let samples = root.path().join("samples/dual-attach_bgp_numbered");
        fs::create_dir_all(&samples).unwrap();
        fs::write(
            samples.join("devices.yml"),
            "- command: device show --namespace=dual-attach_bgp_numbered\n  output: '[\"spine99\"]'\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.timeouts.settle_secs = 0;
        config.timeouts.collection_secs = 0;
        config.suite.dataset_root = root.path().join("datasets");
        config.suite.samples_dir = root.path().join("samples");
        config.suite.base_config = root.path().join("missing-base.yml");
        config.suite.matrix.truncate(0);
        config.suite.matrix.push(crate::common::config::MatrixEntry {
            topology: crate::topology::Topology::DualAttach,
            protocol: crate::topology::Protocol::Bgp,
            scenario: "numbered".to_string(),
        });

        let runner = Arc::new(FakeRunner::new(|argv| {
            if argv.iter().any(|a| a == "unique") {
                CmdOutput::success("14")
            } else if argv.iter().any(|a| a == "show") {
                CmdOutput::success("[\"leaf01\"]")
            } else {
                CmdOutput::success("")
            }
        }));

        let driver = SuiteDriver::new(runner, config.clone());
        let result = driver
            .run(&topologies, Path::new("/opt/netobs"), false)
            .await
            .unwrap();

        assert!(result.passed());
        assert_eq!(result.cases_passed(), 1);
        // group finalizer removed the namespaced area
        assert!(!config
            .suite
            .dataset_root
            .join("dual-attach_bgp_numbered")
            .exists());
    }

    /// An aborted iteration reports itself and the matrix keeps going
    #[tokio::test]
    async fn test_aborted_iteration_does_not_stop_the_matrix() {
        let root = tempfile::tempdir().unwrap();
        let topologies = root.path().join("topologies");
        // only the dual-attach working dir exists; single-attach aborts
        fs::create_dir_all(topologies.join("dual-attach/bgp")).unwrap();
        fs::create_dir_all(topologies.join("dual-attach/parquet-out")).unwrap();

        let samples = root.path().join("samples/dual-attach_bgp_numbered");
        fs::create_dir_all(&samples).unwrap();

        let mut config = Config::default();
        config.timeouts.settle_secs = 0;
        config.timeouts.collection_secs = 0;
        config.suite.dataset_root = root.path().join("datasets");
        config.suite.samples_dir = root.path().join("samples");
        config.suite.base_config = root.path().join("missing-base.yml");
        config.suite.matrix.truncate(0);
        for (topology, protocol) in [
            (crate::topology::Topology::SingleAttach, crate::topology::Protocol::Ospf),
            (crate::topology::Topology::DualAttach, crate::topology::Protocol::Bgp),
        ] {
            config.suite.matrix.push(crate::common::config::MatrixEntry {
                topology,
                protocol,
                scenario: "numbered".to_string(),
            });
        }

        let runner = Arc::new(FakeRunner::new(|argv| {
            if argv.iter().any(|a| a == "unique") {
                CmdOutput::success("14")
            } else {
                CmdOutput::success("")
            }
        }));

        let driver = SuiteDriver::new(runner, config);
        let result = driver
            .run(&topologies, Path::new("/opt/netobs"), false)
            .await
            .unwrap();

        assert_eq!(result.iterations.len(), 2);
        assert!(result.iterations[0].aborted.is_some());
        assert!(result.iterations[1].aborted.is_none());
        assert!(!result.passed());
    }
}
