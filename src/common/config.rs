//! Configuration file handling

use serde::Deserialize;
use std::path::PathBuf;

use crate::topology::{Protocol, Topology, TopologyDescriptor};

use super::paths::{self, config_path};
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// External programs the pipeline drives
    #[serde(default)]
    pub programs: Programs,

    /// Wait intervals for convergence and collection
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Suite-level paths and the topology matrix
    #[serde(default)]
    pub suite: SuiteConfig,
}

/// External programs invoked at the pipeline boundary
#[derive(Debug, Deserialize, Clone)]
pub struct Programs {
    /// CLI under test
    #[serde(default = "default_cli")]
    pub cli: PathBuf,

    /// Poller entrypoint, run detached during collection
    #[serde(default = "default_poller")]
    pub poller: PathBuf,

    /// Provisioning tool (up / status / destroy --force)
    #[serde(default = "default_provisioner")]
    pub provisioner: String,

    /// Playbook runner for scenario deploy and connectivity checks
    #[serde(default = "default_playbook")]
    pub playbook: String,

    /// Run provisioning and playbooks under sudo
    #[serde(default = "default_sudo")]
    pub sudo: bool,
}

impl Default for Programs {
    fn default() -> Self {
        Self {
            cli: default_cli(),
            poller: default_poller(),
            provisioner: default_provisioner(),
            playbook: default_playbook(),
            sudo: default_sudo(),
        }
    }
}

impl Programs {
    /// Resolve bare program names against PATH, leaving explicit paths
    /// untouched. Names that resolve nowhere are kept as-is; the spawn
    /// error they produce later names the missing program.
    pub fn resolved(mut self) -> Self {
        self.cli = resolve(self.cli);
        self.poller = resolve(self.poller);
        self
    }
}

fn resolve(program: PathBuf) -> PathBuf {
    if program.components().count() > 1 {
        return program;
    }
    which::which(&program).unwrap_or(program)
}

fn default_cli() -> PathBuf {
    PathBuf::from("netobs")
}
fn default_poller() -> PathBuf {
    PathBuf::from("netobs-poller")
}
fn default_provisioner() -> String {
    "vagrant".to_string()
}
fn default_playbook() -> String {
    "ansible-playbook".to_string()
}
fn default_sudo() -> bool {
    true
}

/// Wait intervals in seconds
///
/// These are convergence proxies, not completion signals: the pipeline
/// sleeps them unconditionally.
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Settle interval after a scenario deploy
    #[serde(default = "default_settle")]
    pub settle_secs: u64,

    /// Collection window the poller runs for
    #[serde(default = "default_collection")]
    pub collection_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            settle_secs: default_settle(),
            collection_secs: default_collection(),
        }
    }
}

fn default_settle() -> u64 {
    15
}
fn default_collection() -> u64 {
    180
}

/// Suite-level paths and the topology matrix
#[derive(Debug, Deserialize, Clone)]
pub struct SuiteConfig {
    /// Root under which per-run datasets are namespaced
    #[serde(default = "paths::default_dataset_root")]
    pub dataset_root: PathBuf,

    /// Directory holding one fixture subdirectory per run name
    #[serde(default = "default_samples_dir")]
    pub samples_dir: PathBuf,

    /// Base YAML config template for the CLI under test
    #[serde(default = "default_base_config")]
    pub base_config: PathBuf,

    /// Inventory file path relative to a topology directory
    #[serde(default = "default_inventory_file")]
    pub inventory_file: PathBuf,

    /// Topology/protocol/scenario combinations the suite iterates
    #[serde(default = "default_matrix")]
    pub matrix: Vec<MatrixEntry>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            dataset_root: paths::default_dataset_root(),
            samples_dir: default_samples_dir(),
            base_config: default_base_config(),
            inventory_file: default_inventory_file(),
            matrix: default_matrix(),
        }
    }
}

fn default_samples_dir() -> PathBuf {
    PathBuf::from("tests/samples")
}
fn default_base_config() -> PathBuf {
    PathBuf::from("tests/base-cfg.yml")
}
fn default_inventory_file() -> PathBuf {
    PathBuf::from(".vagrant/provisioners/ansible/inventory/vagrant_ansible_inventory")
}

/// One row of the suite matrix
#[derive(Debug, Deserialize, Clone)]
pub struct MatrixEntry {
    pub topology: Topology,
    pub protocol: Protocol,
    pub scenario: String,
}

impl MatrixEntry {
    pub fn descriptor(&self) -> TopologyDescriptor {
        TopologyDescriptor::new(self.topology, self.protocol, self.scenario.clone())
    }
}

fn default_matrix() -> Vec<MatrixEntry> {
    [
        (Topology::DualAttach, Protocol::Evpn, "ospf-ibgp"),
        (Topology::DualAttach, Protocol::Evpn, "centralized"),
        (Topology::SingleAttach, Protocol::Ospf, "numbered"),
        (Topology::DualAttach, Protocol::Bgp, "numbered"),
    ]
    .into_iter()
    .map(|(topology, protocol, scenario)| MatrixEntry {
        topology,
        protocol,
        scenario: scenario.to_string(),
    })
    .collect()
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
