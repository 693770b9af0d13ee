//! Request interception policy
//!
//! One decision per request: bypass entirely, serve from cache, or fetch
//! and populate. Cache wins outright when it matches; there is no
//! freshness check and no revalidation. Errors on this path are logged and
//! absorbed so interception can only ever degrade to default handling.

use crate::error::OfflineResult;
use crate::http::{Method, Request, Response};
use crate::network::NetworkFetch;
use crate::store::CacheStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Query parameters that force a request past the cache entirely
///
/// Auth and recovery flows: their responses must always come from the
/// network and must never be replayable from a cache.
pub const BYPASS_QUERY_PARAMS: &[&str] = &["access_token", "refresh_token", "type"];

/// Why a request was left untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// URL carries an auth or recovery query parameter
    AuthParams,
    /// Top-level navigation; serving a stale document after a redirect
    /// chain cannot be replicated faithfully from cache
    Navigation,
}

/// Per-request interception
pub struct RequestInterceptor {
    version: String,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn NetworkFetch>,
}

impl RequestInterceptor {
    /// Create an interceptor writing new entries under the given version
    pub fn new(
        version: impl Into<String>,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn NetworkFetch>,
    ) -> Self {
        Self {
            version: version.into(),
            store,
            fetcher,
        }
    }

    /// Synchronous bypass decision, made before the store is consulted
    ///
    /// A bypassed request must not touch the cache in either direction.
    pub fn bypass_reason(request: &Request) -> Option<BypassReason> {
        if BYPASS_QUERY_PARAMS
            .iter()
            .any(|param| request.has_query_param(param))
        {
            return Some(BypassReason::AuthParams);
        }
        if request.mode.is_navigation() {
            return Some(BypassReason::Navigation);
        }
        None
    }

    /// Handle one request
    ///
    /// `None` declines to respond: the host falls back to its default
    /// pass-through behavior.
    pub async fn intercept(&self, request: &Request) -> Option<Response> {
        match Self::bypass_reason(request) {
            Some(BypassReason::AuthParams) => {
                debug!("Skipping cache for auth request: {}", request.url);
                return None;
            }
            Some(BypassReason::Navigation) => {
                debug!("Skipping cache for navigation: {}", request.url);
                return None;
            }
            None => {}
        }

        match self.respond(request).await {
            Ok(response) => Some(response),
            Err(e) => {
                warn!("Interception failed for {}: {}", request.url, e);
                None
            }
        }
    }

    async fn respond(&self, request: &Request) -> OfflineResult<Response> {
        if let Some(cached) = self.store.match_request(request).await? {
            debug!("Serving from cache: {}", request.url);
            return Ok(cached);
        }

        let response = self.fetcher.fetch(request).await?;

        // Only successful same-origin GET responses enter the cache;
        // everything else passes through unmodified.
        if request.method != Method::Get || !response.is_cacheable() {
            return Ok(response);
        }

        // One copy for the caller, one for the cache. Storage is
        // fire-and-forget: the response returns without waiting on it.
        let copy = response.duplicate();
        let store = Arc::clone(&self.store);
        let version = self.version.clone();
        let stored_request = request.clone();
        tokio::spawn(async move {
            if let Err(e) = store.open(&version).await {
                warn!("Could not open cache {}: {}", version, e);
                return;
            }
            if let Err(e) = store.put(&version, &stored_request, copy).await {
                warn!("Failed to cache {}: {}", stored_request.url, e);
            }
        });

        Ok(response)
    }
}
