//! Topology descriptors
//!
//! A descriptor names one provisionable arrangement: attachment kind,
//! routing protocol and the scenario variant applied on top. It is selected
//! per suite iteration and immutable from then on.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Attachment pattern of the virtual topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    SingleAttach,
    DualAttach,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::SingleAttach => "single-attach",
            Topology::DualAttach => "dual-attach",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing protocol the topology runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Bgp,
    Ospf,
    Evpn,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Bgp => "bgp",
            Protocol::Ospf => "ospf",
            Protocol::Evpn => "evpn",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provisionable topology/protocol/scenario combination
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TopologyDescriptor {
    pub topology: Topology,
    pub protocol: Protocol,
    pub scenario: String,
}

impl TopologyDescriptor {
    pub fn new(topology: Topology, protocol: Protocol, scenario: impl Into<String>) -> Self {
        Self {
            topology,
            protocol,
            scenario: scenario.into(),
        }
    }

    /// Stable name identifying one collection run.
    ///
    /// Namespaced dataset directories are keyed by this, so runs of
    /// different combinations never overwrite each other.
    pub fn run_name(&self) -> String {
        format!("{}_{}_{}", self.topology, self.protocol, self.scenario)
    }

    /// Working directory of this combination under the topologies root
    pub fn work_dir(&self, topologies_root: &Path) -> PathBuf {
        topologies_root
            .join(self.topology.as_str())
            .join(self.protocol.as_str())
    }

    /// Directory holding the captured data for this topology kind.
    ///
    /// The provisioning layout keeps one data directory per attachment
    /// kind, shared by its protocol subdirectories.
    pub fn topology_dir(&self, topologies_root: &Path) -> PathBuf {
        topologies_root.join(self.topology.as_str())
    }
}

impl fmt::Display for TopologyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.topology, self.protocol, self.scenario)
    }
}
