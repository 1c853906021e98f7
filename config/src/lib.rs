//! Configuration loading and validation for Kava.
//!
//! Raw TOML deserialization structs (with `Option` fields) stay private in
//! this crate. [`KavaConfig::load`] resolves them into validated public
//! types at the parse boundary, so the rest of the system never sees an
//! out-of-range threshold or a zero-length window.

mod resolved;

pub use resolved::{
    ConfigError, KavaConfig, ModelConfig, PolicyConfig, SearchConfig, StorageConfig,
};

use std::path::PathBuf;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "KAVA_CONFIG";

/// Resolve the config file path: `$KAVA_CONFIG` if set, otherwise
/// `~/.kava/config.toml`. Returns `None` when no home directory can be
/// determined.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".kava").join("config.toml"))
}

/// Directory that holds logs and the default database, derived from the
/// config file location.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    config_path().and_then(|p| p.parent().map(PathBuf::from))
}
