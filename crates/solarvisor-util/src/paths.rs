//! Default paths for solarvisor
//!
//! The config file lives under `$XDG_CONFIG_HOME/solarvisor/config.toml`,
//! falling back to `~/.config/solarvisor/config.toml`.

use std::path::PathBuf;

/// Environment variable for overriding the config path
pub const SOLARVISOR_CONFIG_ENV: &str = "SOLARVISOR_CONFIG";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Application subdirectory name
const APP_DIR: &str = "solarvisor";

/// Workload output is discarded unless a log file is configured
pub const DEFAULT_WORKLOAD_LOG: &str = "/dev/null";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$SOLARVISOR_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/solarvisor/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/solarvisor/config.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(SOLARVISOR_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    config_path_without_env()
}

/// Get the config path without checking SOLARVISOR_CONFIG.
pub fn config_path_without_env() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    // Last resort
    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}
