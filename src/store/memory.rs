//! In-memory cache store
//!
//! The default backend for tests and embedded use. Entries live in nested
//! maps guarded by a single async lock; per-key operations are atomic.

use super::{CacheStore, StoredResponse};
use crate::error::OfflineResult;
use crate::http::{Request, Response};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// In-memory versioned cache store
#[derive(Default)]
pub struct MemoryStore {
    caches: RwLock<BTreeMap<String, BTreeMap<String, StoredResponse>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held under a version (test observability)
    pub async fn entry_count(&self, version: &str) -> usize {
        self.caches
            .read()
            .await
            .get(version)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Entry keys held under a version, sorted (test observability)
    pub async fn keys(&self, version: &str) -> Vec<String> {
        self.caches
            .read()
            .await
            .get(version)
            .map(|cache| cache.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, version: &str) -> OfflineResult<()> {
        self.caches
            .write()
            .await
            .entry(version.to_string())
            .or_default();
        Ok(())
    }

    async fn put(
        &self,
        version: &str,
        request: &Request,
        response: Response,
    ) -> OfflineResult<()> {
        let snapshot = StoredResponse::capture(request, response);
        self.caches
            .write()
            .await
            .entry(version.to_string())
            .or_default()
            .insert(snapshot.key.clone(), snapshot);
        Ok(())
    }

    async fn match_request(&self, request: &Request) -> OfflineResult<Option<Response>> {
        let key = request.cache_key();
        let caches = self.caches.read().await;
        for cache in caches.values() {
            if let Some(snapshot) = cache.get(&key) {
                return Ok(Some(snapshot.to_response()));
            }
        }
        Ok(None)
    }

    async fn versions(&self) -> OfflineResult<Vec<String>> {
        Ok(self.caches.read().await.keys().cloned().collect())
    }

    async fn delete(&self, version: &str) -> OfflineResult<bool> {
        Ok(self.caches.write().await.remove(version).is_some())
    }
}
