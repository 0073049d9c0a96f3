use std::path::{Path, PathBuf};

use crate::app_dirs;

use super::types::{ConfigError, ScanSettings};
use super::{CONFIG_FILE_NAME, map_app_dir_error};

/// Resolve the settings file path, ensuring the app root exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load settings from the app root, returning defaults if the file is missing.
pub fn load_or_default() -> Result<ScanSettings, ConfigError> {
    load_from(&config_path()?)
}

/// Load and normalize settings from `path`; a missing file yields defaults.
pub fn load_from(path: &Path) -> Result<ScanSettings, ConfigError> {
    if !path.exists() {
        return Ok(ScanSettings::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<ScanSettings>(&text)
        .map(ScanSettings::normalized)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
}
