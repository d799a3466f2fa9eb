//! Subcommand implementations.

pub mod batch;
pub mod config;
pub mod ledger;
pub mod process;
pub mod rules;

use std::path::{Path, PathBuf};

use tracing::debug;

use factura_core::FacturaConfig;

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("factura")
        .join("config.json")
}

/// Load the configuration from `--config`, then the default location, then defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<FacturaConfig> {
    if let Some(path) = config_path {
        debug!("Loading config from {}", path);
        return Ok(FacturaConfig::from_file(Path::new(path))?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Loading config from {}", default_path.display());
        Ok(FacturaConfig::from_file(&default_path)?)
    } else {
        Ok(FacturaConfig::default())
    }
}

/// Ledger file: `--ledger` wins over the configured path.
pub fn ledger_path(flag: Option<&Path>, config: &FacturaConfig) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| config.ledger.path.clone())
}
