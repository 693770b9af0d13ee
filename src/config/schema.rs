//! Deploy-time configuration schema
//!
//! The deployment ships a `viltrum-offline.toml` next to the app shell.
//! Every field has a default reproducing the current Viltrum Fitness
//! deployment, so a missing file is a valid configuration.

use crate::error::{OfflineError, OfflineResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache version and pre-cache manifest
    pub cache: CacheConfig,

    /// Network settings
    pub network: NetworkConfig,

    /// Cache store backend settings
    pub store: StoreConfig,
}

impl Config {
    /// Validate the configuration
    ///
    /// Fixed at deployment, so validation runs once at load time; nothing
    /// here is runtime-mutable.
    pub fn validate(&self) -> OfflineResult<()> {
        validate_cache_version(&self.cache.version)?;
        for path in &self.cache.precache {
            validate_manifest_path(path)?;
        }
        validate_origin(&self.network.origin)
    }
}

/// Cache version and pre-cache manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Current cache version; opaque, but must be usable as a directory name
    pub version: String,

    /// App-shell paths fetched and stored at install time, in order
    pub precache: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: "viltrum-fitness-v3".to_string(),
            precache: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/dashboard.html".to_string(),
                "/workout.html".to_string(),
                "/nutrition.html".to_string(),
                "/style.css".to_string(),
                "/script.js".to_string(),
                "/auth.js".to_string(),
                "/viewport.js".to_string(),
                "/icons/icon-192x192.png".to_string(),
                "/icons/icon-512x512.png".to_string(),
            ],
        }
    }
}

/// Network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Deployment origin; resolves root-relative manifest paths and decides
    /// the same-origin ("basic") response classification
    pub origin: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            origin: "https://viltrum.fitness".to_string(),
        }
    }
}

/// Cache store backend selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend implementation
    pub backend: StoreBackend,

    /// Root directory for the disk backend; platform cache dir when unset
    pub root: Option<PathBuf>,
}

/// Available store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local, lost on restart
    Memory,
    /// Persistent, the deployment default
    #[default]
    Disk,
}

/// Check that a cache version can double as a directory name
pub fn validate_cache_version(version: &str) -> OfflineResult<()> {
    let reason = if version.is_empty() {
        "must not be empty"
    } else if version == "." || version == ".." {
        "must not be a relative path component"
    } else if version.contains('/') || version.contains('\\') {
        "must not contain path separators"
    } else {
        return Ok(());
    };

    Err(OfflineError::InvalidCacheVersion {
        version: version.to_string(),
        reason: reason.to_string(),
    })
}

/// Check that a manifest path is root-relative
pub fn validate_manifest_path(path: &str) -> OfflineResult<()> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(OfflineError::InvalidManifestPath {
            path: path.to_string(),
            reason: "must be root-relative".to_string(),
        })
    }
}

/// Check that the deployment origin is an absolute http(s) URL without a
/// trailing slash
pub fn validate_origin(origin: &str) -> OfflineResult<()> {
    let reason = if !origin.starts_with("http://") && !origin.starts_with("https://") {
        "must be an absolute http(s) URL"
    } else if origin.ends_with('/') {
        "must not end with a slash"
    } else {
        return Ok(());
    };

    Err(OfflineError::InvalidOrigin {
        origin: origin.to_string(),
        reason: reason.to_string(),
    })
}
