//! Data directory layout for chatkeep.

use std::path::{Path, PathBuf};

use chatkeep_types::config::ChatkeepConfig;

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `CHATKEEP_DATA_DIR` environment variable
/// 2. `~/.chatkeep`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHATKEEP_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".chatkeep");
    }

    // Last resort: current directory
    PathBuf::from(".chatkeep")
}

/// Directory holding session record files: the configured override, or
/// `{data_dir}/sessions`.
pub fn sessions_dir(config: &ChatkeepConfig, data_dir: &Path) -> PathBuf {
    config
        .storage
        .sessions_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("sessions"))
}
