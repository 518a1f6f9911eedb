//! Path Utilities
//!
//! Common path resolution for the bridge's directory and files.

use std::path::PathBuf;

use super::error::ConfigError;

/// Name of the per-user directory under `$HOME`
const BRIDGE_DIR_NAME: &str = ".gsuite-bridge";

/// Get the bridge base directory (`~/.gsuite-bridge/`)
pub fn bridge_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirUnavailable)?;
    Ok(home.join(BRIDGE_DIR_NAME))
}

/// Get a path within the bridge directory
///
/// # Example
/// ```ignore
/// let token = bridge_path("token.json")?;
/// ```
pub fn bridge_path(relative_path: &str) -> Result<PathBuf, ConfigError> {
    Ok(bridge_dir()?.join(relative_path))
}

/// Optional bridge configuration file
pub fn config_path() -> Result<PathBuf, ConfigError> {
    bridge_path("config.json")
}
