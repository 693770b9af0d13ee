//! Error types for viltrum-offline
//!
//! All modules use `OfflineResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for offline-agent operations
pub type OfflineResult<T> = Result<T, OfflineError>;

/// All errors that can occur in the offline agent
#[derive(Error, Debug)]
pub enum OfflineError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Invalid cache version {version:?}: {reason}")]
    InvalidCacheVersion { version: String, reason: String },

    #[error("Invalid manifest path {path:?}: {reason}")]
    InvalidManifestPath { path: String, reason: String },

    #[error("Invalid deployment origin {origin:?}: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    // Lifecycle errors
    #[error("Invalid worker state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("App shell pre-cache failed for {} resource(s): {}", .failed.len(), .failed.join(", "))]
    Precache { failed: Vec<String> },

    // Network errors
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Unsupported request method {method} for {url}")]
    UnsupportedMethod { method: String, url: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OfflineError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a fetch error
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is absorbed by the agent rather than surfaced
    ///
    /// Everything that can happen on the request or lifecycle hot path is
    /// recoverable; only configuration and state-machine errors propagate
    /// to the embedding application.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::ConfigInvalid { .. }
                | Self::ConfigNotFound(_)
                | Self::InvalidCacheVersion { .. }
                | Self::InvalidManifestPath { .. }
                | Self::InvalidOrigin { .. }
                | Self::InvalidStateTransition { .. }
        )
    }
}
