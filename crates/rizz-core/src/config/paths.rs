//! Standard config locations

use std::path::PathBuf;

/// Directory holding rizz configuration
///
/// `<platform config dir>/rizz`, or `./rizz` when the platform has none.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rizz")
}

/// Default engine config file: `<config dir>/rizz/config.yaml`
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}
