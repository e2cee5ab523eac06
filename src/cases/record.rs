//! Case record model
//!
//! Defines the data structures for deserializing fixture files: one YAML
//! sequence of command/expectation records per case group.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

/// One declarative command/expectation pair
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaseRecord {
    /// Command line for the CLI under test, shell-tokenizable
    pub command: String,

    /// Expected payload: JSON-encoded or raw text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// The command is known to fail, optionally with exact error text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xfail: Option<Xfail>,

    /// Presence-only marker: any error satisfies the case
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_yaml::Value>,
}

/// Expected-failure detail
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Xfail {
    /// Exact error text the command is known to produce
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The declared expectation of a record, exactly one per case
#[derive(Debug)]
pub enum Expectation<'a> {
    Output(&'a str),
    Xfail(&'a Xfail),
    Error,
}

impl CaseRecord {
    /// A record must declare exactly one of output / xfail / error.
    ///
    /// Violations are specification errors, surfaced distinctly from
    /// assertion failures so malformed fixtures stay diagnosable.
    pub fn expectation(&self) -> Result<Expectation<'_>> {
        match (&self.output, &self.xfail, &self.error) {
            (Some(output), None, None) => Ok(Expectation::Output(output)),
            (None, Some(xfail), None) => Ok(Expectation::Xfail(xfail)),
            (None, None, Some(_)) => Ok(Expectation::Error),
            (None, None, None) => Err(Error::CaseSpec(format!(
                "case '{}' declares none of output/xfail/error",
                self.command
            ))),
            _ => Err(Error::CaseSpec(format!(
                "case '{}' declares more than one of output/xfail/error",
                self.command
            ))),
        }
    }
}

/// Load every case record from one fixture file
pub fn load_fixture(path: &Path) -> Result<Vec<CaseRecord>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::fixture(path, e))?;
    serde_yaml::from_str(&content).map_err(|e| Error::fixture(path, e))
}

/// Load all fixture files from a sample directory, sorted by name
pub fn load_dir(dir: &Path) -> Result<Vec<(PathBuf, Vec<CaseRecord>)>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext == "yml" || ext == "yaml")
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    files
        .into_iter()
        .map(|path| load_fixture(&path).map(|records| (path, records)))
        .collect()
}
