//! Scan settings persisted as TOML under the app root.

mod load;
mod save;
mod types;

pub use load::{config_path, load_from, load_or_default};
pub use save::{save, save_to_path};
pub use types::{ConfigError, ScanSettings};

/// Filename of the settings file inside the app root.
pub const CONFIG_FILE_NAME: &str = "config.toml";

fn map_app_dir_error(error: crate::app_dirs::AppDirError) -> ConfigError {
    match error {
        crate::app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        crate::app_dirs::AppDirError::CreateDir { path, source } => {
            ConfigError::CreateDir { path, source }
        }
    }
}
