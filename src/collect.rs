//! Collection sessions
//!
//! One session provisions a topology, applies its scenario, runs the poller
//! for a bounded window against the live devices, suspends it, and tears
//! the topology down. The captured dataset is handed back for case
//! evaluation. A structural quality gate runs before teardown.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_yaml::{Mapping, Value};
use tracing::{info, warn};

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::provision::Provisioner;
use crate::runner::{CommandRunner, STOP_SIGNAL};
use crate::topology::TopologyDescriptor;

/// File name of the run-scoped config handed to the CLI under test
const RUN_CONFIG_FILE: &str = "netobs-cfg.yml";

/// Subdirectory a topology's captured data lands in
pub const DATA_SUBDIR: &str = "parquet-out";

/// Host count every healthy topology run collects
const EXPECTED_HOSTS: &str = "14";

/// Protocols whose assert subcommand gates collection quality
const ASSERT_PROTOCOLS: [&str; 4] = ["bgp", "interface", "ospf", "evpnVni"];

/// Exit indicators the assert subcommand may return without flagging a
/// collection defect: clean, assertion failed, no data to assert on
const ASSERT_OK_CODES: [Option<i32>; 3] = [None, Some(1), Some(255)];

/// Filesystem location of one run's captured dataset.
///
/// Created here, read-only to the evaluator, removed by the suite driver's
/// group finalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetHandle(PathBuf);

impl DatasetHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// Outcome of one collection run
#[derive(Debug)]
pub struct Collection {
    pub dataset: DatasetHandle,
    pub config_file: PathBuf,
}

/// Builds run-scoped configs for the CLI under test by merging a base
/// template with derived directories
pub struct ConfigBuilder {
    base: Mapping,
}

impl ConfigBuilder {
    /// Load the base template; a missing file yields an empty base
    pub fn load(base_path: &Path) -> Result<Self> {
        if !base_path.exists() {
            return Ok(Self {
                base: Mapping::new(),
            });
        }
        let content = std::fs::read_to_string(base_path).map_err(|e| Error::FileRead {
            path: base_path.display().to_string(),
            error: e.to_string(),
        })?;
        let base: Mapping = serde_yaml::from_str(&content)?;
        Ok(Self { base })
    }

    /// Derive one run's config: point data-directory at the run's capture
    /// dir and anchor the template's service/schema directories under the
    /// tool's install directory
    pub fn for_run(&self, data_dir: &Path, install_dir: &Path) -> Mapping {
        let mut config = self.base.clone();
        config.insert(
            Value::from("data-directory"),
            Value::from(data_dir.display().to_string()),
        );
        for key in ["service-directory", "schema-directory"] {
            if let Some(relative) = config.get(key).and_then(Value::as_str) {
                let anchored = install_dir.join(relative);
                config.insert(Value::from(key), Value::from(anchored.display().to_string()));
            }
        }
        config
    }

    /// Serialize a run config to its file
    pub fn write(config: &Mapping, path: &Path) -> Result<()> {
        let text = serde_yaml::to_string(config)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

pub struct CollectionSession {
    runner: Arc<dyn CommandRunner>,
    provisioner: Provisioner,
    config: Config,
}

impl CollectionSession {
    pub fn new(runner: Arc<dyn CommandRunner>, config: Config) -> Self {
        let provisioner = Provisioner::new(
            runner.clone(),
            config.programs.clone(),
            &config.timeouts,
        );
        Self {
            runner,
            provisioner,
            config,
        }
    }

    /// Provision, deploy, poll and verify one topology combination.
    ///
    /// The final teardown runs on every path out of this call (success,
    /// deploy failure, or a failed quality gate), so a caller never owns a
    /// live topology. An unrecovered deploy failure aborts before any
    /// dataset handle exists.
    pub async fn collect(
        &self,
        desc: &TopologyDescriptor,
        topologies_root: &Path,
        install_dir: &Path,
    ) -> Result<Collection> {
        let work_dir = desc.work_dir(topologies_root);

        let up_code = self.provisioner.bring_up(&work_dir).await?;
        if let Some(code) = up_code {
            warn!(code, topology = %desc, "status check reported a non-clean topology");
        }

        let outcome = self.collect_inner(desc, topologies_root, install_dir, &work_dir).await;

        if let Err(e) = self.provisioner.bring_down(&work_dir).await {
            warn!(error = %e, topology = %desc, "teardown failed");
        }

        outcome
    }

    async fn collect_inner(
        &self,
        desc: &TopologyDescriptor,
        topologies_root: &Path,
        install_dir: &Path,
        work_dir: &Path,
    ) -> Result<Collection> {
        self.provisioner
            .deploy_scenario_with_retry(&desc.scenario, work_dir)
            .await?;

        let run_name = desc.run_name();
        let topology_dir = desc.topology_dir(topologies_root);
        let data_dir = topology_dir.join(DATA_SUBDIR);

        let builder = ConfigBuilder::load(&self.config.suite.base_config)?;
        let run_config = builder.for_run(&data_dir, install_dir);
        let config_file = work_dir.join(RUN_CONFIG_FILE);
        ConfigBuilder::write(&run_config, &config_file)?;
        info!(config = %config_file.display(), "run config written");

        let inventory = topology_dir.join(&self.config.suite.inventory_file);
        let poller_argv = vec![
            self.config.programs.poller.display().to_string(),
            "-i".to_string(),
            inventory.display().to_string(),
            "-n".to_string(),
            run_name.clone(),
        ];
        let pid = self.runner.spawn_detached(&poller_argv, work_dir)?;

        let window = Duration::from_secs(self.config.timeouts.collection_secs);
        info!(pid, secs = window.as_secs(), "poller collecting");
        tokio::time::sleep(window).await;

        // Suspend rather than kill: some poller exit paths are expensive to
        // re-trigger, and a stopped process stays resumable
        self.runner.signal(pid, STOP_SIGNAL)?;

        self.verify_collection(&run_name, &config_file, work_dir)
            .await?;

        Ok(Collection {
            dataset: DatasetHandle::new(data_dir),
            config_file,
        })
    }

    /// Structural quality gate over the captured dataset.
    ///
    /// Checks that the expected host count shows up and that each
    /// protocol's assert subcommand ran without catastrophic failure. Row
    /// content is never inspected.
    pub async fn verify_collection(
        &self,
        run_name: &str,
        config_file: &Path,
        work_dir: &Path,
    ) -> Result<()> {
        let cli = self.config.programs.cli.display().to_string();
        let config_flag = format!("--config={}", config_file.display());

        let argv = vec![
            cli.clone(),
            config_flag.clone(),
            "device".to_string(),
            "unique".to_string(),
            "--columns=namespace".to_string(),
            format!("--namespace={run_name}"),
        ];
        let out = self.runner.run(&argv, work_dir).await?;
        let listing = out.stdout.clone().unwrap_or_else(|| out.error_text());
        if !listing.contains(EXPECTED_HOSTS) {
            return Err(Error::collection_quality(
                run_name,
                format!("expected {EXPECTED_HOSTS} hosts in namespace listing, got: {listing}"),
            ));
        }

        for proto in ASSERT_PROTOCOLS {
            let argv = vec![
                cli.clone(),
                config_flag.clone(),
                proto.to_string(),
                "assert".to_string(),
                format!("--namespace={run_name}"),
            ];
            let out = self.runner.run(&argv, work_dir).await?;
            if !ASSERT_OK_CODES.contains(&out.code) {
                return Err(Error::collection_quality(
                    run_name,
                    format!(
                        "'{proto} assert' exited {:?}: {}",
                        out.code,
                        out.error_text()
                    ),
                ));
            }
        }

        Ok(())
    }
}
