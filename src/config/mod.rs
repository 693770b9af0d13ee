//! Deploy-time configuration loading
//!
//! Configuration is read once, at startup, from a TOML file shipped with
//! the deployment. It is never written back or mutated at runtime.

pub mod schema;

pub use schema::{
    validate_cache_version, validate_manifest_path, validate_origin, CacheConfig, Config,
    NetworkConfig, StoreBackend, StoreConfig,
};

use crate::error::{OfflineError, OfflineResult};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Conventional deploy config file name, alongside the app shell
pub const DEPLOY_CONFIG_FILE: &str = "viltrum-offline.toml";

impl Config {
    /// Load and validate configuration from a file
    pub async fn load(path: &Path) -> OfflineResult<Self> {
        if !path.exists() {
            return Err(OfflineError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| OfflineError::io(format!("reading config from {}", path.display()), e))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| OfflineError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to the shipped defaults
    pub async fn load_or_default(path: &Path) -> OfflineResult<Self> {
        if !path.exists() {
            debug!("Deploy config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path).await
    }
}
