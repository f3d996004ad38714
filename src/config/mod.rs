pub mod schema;

pub use schema::ShopkeepConfig;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Default shopkeep home directory (~/.shopkeep).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".shopkeep"))
        .unwrap_or_else(|| PathBuf::from(".shopkeep"))
}

/// Load config from the given path, or return defaults.
///
/// Environment overrides are applied separately so that a bare-environment
/// deployment (no config file at all) still works.
pub fn load_config(path: &Path) -> Result<ShopkeepConfig> {
    if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read shopkeep config file")?;
        let config: ShopkeepConfig =
            toml::from_str(&contents).context("Failed to parse shopkeep config (TOML)")?;
        Ok(config)
    } else {
        Ok(ShopkeepConfig::default())
    }
}
