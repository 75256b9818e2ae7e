//! Where `afe.toml` is read from and where the wake-word sockets live.
//!
//! ```text
//! <config dir>/afe-pipeline/afe.toml      e.g. ~/.config/afe-pipeline/afe.toml
//! <runtime dir>/afe-pipeline/*.sock       e.g. /run/user/1000/afe-pipeline/
//! ```
//!
//! Without a runtime dir (macOS, minimal containers) the sockets go under the
//! system temp directory; without a config dir the file is looked up in the
//! working directory.

use std::path::PathBuf;

const APP_DIR: &str = "afe-pipeline";
const SETTINGS_NAME: &str = "afe.toml";

/// Locations resolved once from the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub settings_file: PathBuf,
    /// Directory shared with the wake-word process.
    pub runtime_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        Self::resolve(dirs::config_dir(), dirs::runtime_dir())
    }

    fn resolve(config_base: Option<PathBuf>, runtime_base: Option<PathBuf>) -> Self {
        let settings_file = config_base
            .unwrap_or_default()
            .join(APP_DIR)
            .join(SETTINGS_NAME);
        let runtime_dir = runtime_base.unwrap_or_else(std::env::temp_dir).join(APP_DIR);
        Self {
            settings_file,
            runtime_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
