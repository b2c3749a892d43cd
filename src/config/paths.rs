use std::path::Path;

use crate::constants::env_vars;

/// Returns the path of the config file.
///
/// # Notes
/// - `DISCOVERY_CONFIG` takes precedence when set
/// - Otherwise uses the platform-specific config directory (e.g., ~/.config on Linux)
/// - Falls back to current directory if config directory is unavailable
pub fn get_config_path() -> String {
    if let Ok(path) = std::env::var(env_vars::CONFIG_PATH)
        && !path.is_empty()
    {
        return path;
    }

    dirs::config_dir()
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join("discovery_events")
        .join("config.toml")
        .to_string_lossy()
        .to_string()
}

/// Returns the platform-specific path for the log directory.
///
/// # Notes
/// - Uses platform-specific config directory (e.g., ~/.config on Linux)
/// - Falls back to current directory if config directory is unavailable
pub fn get_log_dir_path() -> String {
    dirs::config_dir()
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join("discovery_events")
        .join("logs")
        .to_string_lossy()
        .to_string()
}
