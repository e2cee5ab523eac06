//! Configuration and dataset paths

use std::io;
use std::path::PathBuf;

/// Name used for platform directories
const APP_NAME: &str = "topoharness";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/topoharness/`
/// - macOS: `~/Library/Application Support/topoharness/`
/// - Windows: `%APPDATA%\topoharness\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Default root under which per-run datasets are namespaced
pub fn default_dataset_root() -> PathBuf {
    std::env::temp_dir().join("topoharness-datasets")
}

/// Ensure the configuration directory exists
pub fn ensure_config_dir() -> io::Result<Option<PathBuf>> {
    if let Some(dir) = config_dir() {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(Some(dir))
    } else {
        Ok(None)
    }
}
