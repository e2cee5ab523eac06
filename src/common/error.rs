//! Error types for the topology harness
//!
//! Ordinary command failure is data, not an error: the process runner
//! returns captured output and an exit indicator instead. The variants here
//! cover spawn-level failures, provisioning aborts, malformed fixtures and
//! plumbing.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Provisioning Errors ===
    #[error("Provisioning failed for '{topology}': {detail}")]
    Provisioning { topology: String, detail: String },

    #[error("Scenario '{scenario}' did not converge after retry: {detail}")]
    ScenarioDeploy { scenario: String, detail: String },

    // === Collection Errors ===
    #[error("Collection quality check failed for '{run}': {detail}")]
    CollectionQuality { run: String, detail: String },

    // === Case / Fixture Errors ===
    #[error("Invalid case record: {0}")]
    CaseSpec(String),

    #[error("Failed to load fixture '{path}': {error}")]
    Fixture { path: String, error: String },

    #[error("Failed to update fixture '{path}': {detail}")]
    FixtureUpdate { path: String, detail: String },

    // === Process Errors ===
    #[error("Failed to spawn '{program}': {error}")]
    Spawn { program: String, error: String },

    #[error("Empty command")]
    EmptyCommand,

    #[error("Unbalanced quote in command '{0}'")]
    UnbalancedQuote(String),

    #[error("Signals are not supported on this platform")]
    SignalUnsupported,

    // === Suite Errors ===
    #[error("{failed} of {total} cases failed")]
    SuiteFailed { failed: usize, total: usize },

    #[error("{aborted} of {total} topology iterations aborted")]
    SuiteAborted { aborted: usize, total: usize },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a provisioning error for a topology
    pub fn provisioning(topology: &str, detail: impl Into<String>) -> Self {
        Self::Provisioning {
            topology: topology.to_string(),
            detail: detail.into(),
        }
    }

    /// Create a collection quality error for a run
    pub fn collection_quality(run: &str, detail: impl Into<String>) -> Self {
        Self::CollectionQuality {
            run: run.to_string(),
            detail: detail.into(),
        }
    }

    /// Create a spawn error for a program
    pub fn spawn(program: &str, error: impl std::fmt::Display) -> Self {
        Self::Spawn {
            program: program.to_string(),
            error: error.to_string(),
        }
    }

    /// Create a fixture load error
    pub fn fixture(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::Fixture {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}
