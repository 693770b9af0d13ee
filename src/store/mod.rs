//! Cache store abstraction
//!
//! The platform cache is modeled as an injectable trait so in-memory or
//! disk-backed implementations can stand in for it. The agent never owns
//! cached state directly; it holds an `Arc<dyn CacheStore>` and transient
//! response duplicates scoped to a single operation.

mod disk;
mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::OfflineResult;
use crate::http::{Request, Response, ResponseKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A stored response snapshot
///
/// The serialized form of a cache entry: everything needed to replay the
/// response later, plus the identity it was stored under and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResponse {
    /// Normalized request identity (method + URL)
    pub key: String,
    /// Original request URL
    pub url: String,
    /// Response status
    pub status: u16,
    /// Response headers
    pub headers: BTreeMap<String, String>,
    /// Origin classification at capture time
    pub kind: ResponseKind,
    /// Response body
    pub body: Vec<u8>,
    /// When the entry was stored
    pub stored_at: DateTime<Utc>,
}

impl StoredResponse {
    /// Capture a response under the given request's identity
    pub fn capture(request: &Request, response: Response) -> Self {
        let kind = response.kind();
        let status = response.status();
        let headers = response.headers().clone();
        Self {
            key: request.cache_key(),
            url: request.url.clone(),
            status,
            headers,
            kind,
            body: response.into_body(),
            stored_at: Utc::now(),
        }
    }

    /// Rebuild a response from the snapshot
    pub fn to_response(&self) -> Response {
        Response::new(self.status, self.kind, self.body.clone())
            .with_headers(self.headers.clone())
    }
}

/// Abstract versioned cache store
///
/// Implementations must make individual `put` and `match_request` calls
/// atomic per key; the agent relies on that instead of locking. Concurrent
/// writes to the same key are last-write-wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Ensure the named cache version exists and is ready for writes
    async fn open(&self, version: &str) -> OfflineResult<()>;

    /// Store a response snapshot under the request's identity
    async fn put(&self, version: &str, request: &Request, response: Response)
        -> OfflineResult<()>;

    /// Look up a response by normalized request identity
    ///
    /// Searches every cache version present, matching platform semantics;
    /// after activation only the current version remains anyway.
    async fn match_request(&self, request: &Request) -> OfflineResult<Option<Response>>;

    /// Enumerate the cache versions currently present
    async fn versions(&self) -> OfflineResult<Vec<String>>;

    /// Delete an entire cache version; returns whether it existed
    async fn delete(&self, version: &str) -> OfflineResult<bool>;
}

/// Build the configured store backend
pub fn create_store(config: &StoreConfig) -> Arc<dyn CacheStore> {
    match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Disk => {
            let root = config
                .root
                .clone()
                .unwrap_or_else(DiskStore::default_root);
            Arc::new(DiskStore::new(root))
        }
    }
}
