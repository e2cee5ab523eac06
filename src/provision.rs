//! Topology provisioning
//!
//! Drives the external provisioning tool and the configuration-management
//! playbooks for one topology working directory. Owns the retry policy for
//! scenario deployment: one teardown-and-redeploy after a failed
//! connectivity check, then fatal for the iteration.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::common::config::{Programs, Timeouts};
use crate::common::{Error, Result};
use crate::runner::{CmdOutput, CommandRunner};

pub struct Provisioner {
    runner: Arc<dyn CommandRunner>,
    programs: Programs,
    settle: Duration,
}

impl Provisioner {
    pub fn new(runner: Arc<dyn CommandRunner>, programs: Programs, timeouts: &Timeouts) -> Self {
        Self {
            runner,
            programs,
            settle: Duration::from_secs(timeouts.settle_secs),
        }
    }

    fn tool_argv(&self, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::new();
        if self.programs.sudo {
            argv.push("sudo".to_string());
        }
        argv.push(self.programs.provisioner.clone());
        argv.extend(args.iter().map(|s| s.to_string()));
        argv
    }

    fn playbook_argv(&self, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::new();
        if self.programs.sudo {
            argv.push("sudo".to_string());
        }
        argv.push(self.programs.playbook.clone());
        argv.extend(args.iter().map(|s| s.to_string()));
        argv
    }

    /// The provisioning tool runs as another user; artifacts it creates
    /// must be readable by this process
    async fn fix_ownership(&self, work_dir: &Path) -> Result<()> {
        let user = std::env::var("USER").unwrap_or_else(|_| "root".to_string());
        let argv: Vec<String> = ["sudo", "chown", "-R", user.as_str(), ".."]
            .iter()
            .map(|s| s.to_string())
            .collect();
        self.runner.run(&argv, work_dir).await?;
        Ok(())
    }

    /// Bring the topology up and make its artifacts readable.
    ///
    /// Returns the status check's exit indicator.
    pub async fn bring_up(&self, work_dir: &Path) -> Result<Option<i32>> {
        info!(dir = %work_dir.display(), "bringing topology up");
        self.runner.run(&self.tool_argv(&["up"]), work_dir).await?;
        let status = self
            .runner
            .run(&self.tool_argv(&["status"]), work_dir)
            .await?;
        self.fix_ownership(work_dir).await?;
        Ok(status.code)
    }

    /// Apply a scenario to an already-up topology, wait for convergence,
    /// then check connectivity.
    ///
    /// Returns the connectivity check's outcome; a non-null exit indicator
    /// means the scenario did not come up cleanly.
    pub async fn deploy_scenario(&self, scenario: &str, work_dir: &Path) -> Result<CmdOutput> {
        info!(scenario, "deploying scenario");
        let deploy = self.playbook_argv(&["-b", "-e", &format!("scenario={scenario}"), "deploy.yml"]);
        self.runner.run(&deploy, work_dir).await?;

        tokio::time::sleep(self.settle).await;

        self.runner
            .run(&self.playbook_argv(&["ping.yml"]), work_dir)
            .await
    }

    /// Deploy with the single-retry policy.
    ///
    /// A failed connectivity check triggers one full teardown and redeploy.
    /// A second failure propagates as an unrecovered error, bounding the
    /// iteration's runtime.
    pub async fn deploy_scenario_with_retry(
        &self,
        scenario: &str,
        work_dir: &Path,
    ) -> Result<CmdOutput> {
        let first = self.deploy_scenario(scenario, work_dir).await?;
        if first.succeeded() {
            return Ok(first);
        }

        warn!(
            scenario,
            code = ?first.code,
            "connectivity check failed, retrying scenario deploy"
        );
        self.bring_down(work_dir).await?;

        let second = self.deploy_scenario(scenario, work_dir).await?;
        if second.succeeded() {
            return Ok(second);
        }
        Err(Error::ScenarioDeploy {
            scenario: scenario.to_string(),
            detail: format!("exit {:?}: {}", second.code, second.error_text()),
        })
    }

    /// Tear the topology down.
    ///
    /// Idempotent: safe to call even if `bring_up` never completed, so the
    /// iteration-final cleanup path can run it unconditionally.
    pub async fn bring_down(&self, work_dir: &Path) -> Result<()> {
        info!(dir = %work_dir.display(), "tearing topology down");
        self.fix_ownership(work_dir).await?;
        self.runner
            .run(&self.tool_argv(&["destroy", "--force"]), work_dir)
            .await?;
        Ok(())
    }
}
