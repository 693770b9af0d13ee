//! Disk-backed cache store
//!
//! One directory per cache version, one pretty-printed JSON document per
//! entry, named by the SHA-256 of the cache key. Survives restarts, which
//! is the point of an offline cache.

use super::{CacheStore, StoredResponse};
use crate::config::validate_cache_version;
use crate::error::{OfflineError, OfflineResult};
use crate::http::{Request, Response};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

/// Disk-backed versioned cache store
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Create a store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default root: the platform cache directory
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("viltrum-offline")
    }

    fn version_dir(&self, version: &str) -> OfflineResult<PathBuf> {
        validate_cache_version(version)?;
        Ok(self.root.join(version))
    }

    fn entry_file(dir: &Path, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        dir.join(format!("{}.json", hex::encode(digest)))
    }

    async fn list_versions(&self) -> OfflineResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(OfflineError::io(
                    format!("reading cache root {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OfflineError::io("reading cache root entry", e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                versions.push(name.to_string());
            }
        }
        versions.sort();
        Ok(versions)
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn open(&self, version: &str) -> OfflineResult<()> {
        let dir = self.version_dir(version)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| OfflineError::io(format!("creating cache version {}", dir.display()), e))
    }

    async fn put(
        &self,
        version: &str,
        request: &Request,
        response: Response,
    ) -> OfflineResult<()> {
        let dir = self.version_dir(version)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| OfflineError::io(format!("creating cache version {}", dir.display()), e))?;

        let snapshot = StoredResponse::capture(request, response);
        let path = Self::entry_file(&dir, &snapshot.key);
        let content = serde_json::to_string_pretty(&snapshot)?;

        fs::write(&path, content)
            .await
            .map_err(|e| OfflineError::io(format!("writing cache entry {}", path.display()), e))
    }

    async fn match_request(&self, request: &Request) -> OfflineResult<Option<Response>> {
        let key = request.cache_key();
        for version in self.list_versions().await? {
            let path = Self::entry_file(&self.root.join(&version), &key);
            let content = match fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(OfflineError::io(
                        format!("reading cache entry {}", path.display()),
                        e,
                    ))
                }
            };

            match serde_json::from_str::<StoredResponse>(&content) {
                Ok(snapshot) => return Ok(Some(snapshot.to_response())),
                Err(e) => {
                    // A corrupt entry is a miss, not a failure
                    warn!("Corrupt cache entry {}: {}", path.display(), e);
                }
            }
        }
        Ok(None)
    }

    async fn versions(&self) -> OfflineResult<Vec<String>> {
        self.list_versions().await
    }

    async fn delete(&self, version: &str) -> OfflineResult<bool> {
        let dir = self.version_dir(version)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(OfflineError::io(
                format!("deleting cache version {}", dir.display()),
                e,
            )),
        }
    }
}
