//! Worker lifecycle management
//!
//! Owns the install and activate transitions: install pre-caches the app
//! shell and requests immediate takeover, activate garbage-collects stale
//! cache versions and claims open clients. Pre-cache failure is logged and
//! absorbed; installation must complete even with zero caching.

use crate::clients::ClientRegistry;
use crate::config::CacheConfig;
use crate::error::{OfflineError, OfflineResult};
use crate::http::Request;
use crate::network::NetworkFetch;
use crate::store::CacheStore;
use futures_util::future::join_all;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Worker lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Registered, nothing has run yet
    Parsed,
    /// Install event in flight
    Installing,
    /// Installed, eligible to activate
    Installed,
    /// Activate event in flight
    Activating,
    /// Active; the interception policy is authoritative
    Activated,
}

impl WorkerState {
    /// Whether the worker controls request interception
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Activated)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check if a state transition is valid
///
/// `Activated -> Activating` is permitted: the host may re-deliver the
/// activate event, and activation is idempotent.
fn is_valid_transition(from: WorkerState, to: WorkerState) -> bool {
    use WorkerState::*;

    matches!(
        (from, to),
        (Parsed, Installing)
            | (Installing, Installed)
            | (Installed, Activating)
            | (Activating, Activated)
            | (Activated, Activating)
    )
}

/// Drives the install and activate transitions for one worker version
pub struct LifecycleController {
    cache: CacheConfig,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn NetworkFetch>,
    clients: Arc<ClientRegistry>,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
}

impl LifecycleController {
    /// Create a controller for the configured cache version
    pub fn new(
        cache: CacheConfig,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn NetworkFetch>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            cache,
            store,
            fetcher,
            clients,
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
        }
    }

    /// The current cache version
    pub fn version(&self) -> &str {
        &self.cache.version
    }

    /// Current lifecycle state
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn transition(&self, to: WorkerState) -> OfflineResult<()> {
        let mut state = self.state.write().await;
        if !is_valid_transition(*state, to) {
            return Err(OfflineError::InvalidStateTransition {
                from: (*state).to_string(),
                to: to.to_string(),
            });
        }
        debug!("Worker state: {} -> {}", *state, to);
        *state = to;
        Ok(())
    }

    /// Install transition: pre-cache the app shell
    ///
    /// Completes even when pre-caching fails partially or entirely;
    /// availability wins over a complete shell. Requests immediate
    /// activation eligibility as a side effect.
    pub async fn install(&self) -> OfflineResult<()> {
        self.transition(WorkerState::Installing).await?;
        info!("Installing {}...", self.cache.version);

        match self.precache().await {
            Ok(stored) => info!("Cached app shell ({} entries)", stored),
            Err(e) => warn!("App shell caching failed: {}", e),
        }

        // Skip the grace period so this version takes over as soon as the
        // host delivers activate.
        self.skip_waiting.store(true, Ordering::SeqCst);

        self.transition(WorkerState::Installed).await
    }

    /// Fetch every manifest path concurrently and store the successes
    ///
    /// Reports failure if any path could not be fetched or stored, after
    /// storing everything that could be.
    async fn precache(&self) -> OfflineResult<usize> {
        self.store.open(&self.cache.version).await?;

        let fetches = self.cache.precache.iter().map(|path| {
            let request = Request::get(path.clone());
            async move {
                let result = self.fetcher.fetch(&request).await;
                (path, request, result)
            }
        });
        let results = join_all(fetches).await;

        let mut stored = 0;
        let mut failed = Vec::new();
        for (path, request, result) in results {
            match result {
                Ok(response) if response.is_cacheable() => {
                    match self.store.put(&self.cache.version, &request, response).await {
                        Ok(()) => stored += 1,
                        Err(e) => {
                            warn!("Failed to store {}: {}", path, e);
                            failed.push(path.clone());
                        }
                    }
                }
                Ok(response) => {
                    debug!("Not caching {} (status {})", path, response.status());
                    failed.push(path.clone());
                }
                Err(e) => {
                    debug!("Pre-cache fetch failed for {}: {}", path, e);
                    failed.push(path.clone());
                }
            }
        }

        if failed.is_empty() {
            Ok(stored)
        } else {
            Err(OfflineError::Precache { failed })
        }
    }

    /// Whether this version may take over now
    ///
    /// True once skip-waiting was requested, or when no client is still
    /// controlled by another version.
    pub async fn ready_to_activate(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
            || self.clients.controlled_by_other(&self.cache.version).await == 0
    }

    /// Activate transition: delete stale cache versions, claim clients
    pub async fn activate(&self) -> OfflineResult<()> {
        self.transition(WorkerState::Activating).await?;
        info!("Activating {}...", self.cache.version);

        self.delete_stale_versions().await;

        let claimed = self.clients.claim(&self.cache.version).await;
        if claimed > 0 {
            debug!("Claimed {} open client(s)", claimed);
        }

        self.transition(WorkerState::Activated).await
    }

    /// Delete every version except the current one
    ///
    /// Deletions run concurrently and fail independently; enumeration
    /// failure skips cleanup entirely rather than failing activation.
    async fn delete_stale_versions(&self) {
        let versions = match self.store.versions().await {
            Ok(versions) => versions,
            Err(e) => {
                warn!("Could not enumerate cache versions: {}", e);
                return;
            }
        };

        let deletions = versions
            .into_iter()
            .filter(|version| *version != self.cache.version)
            .map(|stale| async move {
                info!("Deleting old cache: {}", stale);
                if let Err(e) = self.store.delete(&stale).await {
                    warn!("Failed to delete old cache {}: {}", stale, e);
                }
            });
        join_all(deletions).await;
    }
}
