// src/infra/paths.rs — Config file location
//
// PATENTSCOUT_HOME relocates the config directory. When unset, config lives
// under ~/.patentscout/. Cache and history paths come from the config itself
// and default to the working directory.

use std::path::PathBuf;

const HOME_ENV: &str = "PATENTSCOUT_HOME";

fn patentscout_home() -> Option<PathBuf> {
    std::env::var_os(HOME_ENV).map(PathBuf::from)
}

/// Home directory, if one can be determined.
pub fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().to_path_buf())
}

/// Configuration directory: $PATENTSCOUT_HOME/ or ~/.patentscout/
pub fn config_dir() -> Option<PathBuf> {
    if let Some(home) = patentscout_home() {
        return Some(home);
    }
    dirs_home().map(|h| h.join(".patentscout"))
}

/// Config file path
pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}
