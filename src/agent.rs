//! Agent facade and host event loop
//!
//! `OfflineAgent` wires the lifecycle controller and the interception
//! policy over one shared store and fetcher. `HostEvent` models the
//! platform's inbound events; each carries a completion token resolved
//! once the work it names has fully settled.

use crate::clients::ClientRegistry;
use crate::config::{CacheConfig, Config};
use crate::error::OfflineResult;
use crate::http::{Request, Response};
use crate::lifecycle::{LifecycleController, WorkerState};
use crate::network::{HttpFetcher, NetworkFetch};
use crate::policy::RequestInterceptor;
use crate::store::{create_store, CacheStore};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Inbound platform lifecycle events
///
/// `Install` and `Activate` resolve their token when the transition has
/// completed, failed sub-operations included. `Fetch` resolves with the
/// outcome response; `None` declines, and the host passes the request
/// through untouched.
pub enum HostEvent {
    Install {
        done: oneshot::Sender<OfflineResult<()>>,
    },
    Activate {
        done: oneshot::Sender<OfflineResult<()>>,
    },
    Fetch {
        request: Request,
        respond_to: oneshot::Sender<Option<Response>>,
    },
}

/// The offline-caching agent
pub struct OfflineAgent {
    lifecycle: LifecycleController,
    interceptor: RequestInterceptor,
    clients: Arc<ClientRegistry>,
}

impl OfflineAgent {
    /// Build an agent from deploy configuration: configured store backend,
    /// ureq-backed fetcher
    pub fn from_config(config: &Config) -> Self {
        let store = create_store(&config.store);
        let fetcher: Arc<dyn NetworkFetch> =
            Arc::new(HttpFetcher::new(config.network.origin.clone()));
        Self::with_parts(config.cache.clone(), store, fetcher)
    }

    /// Build an agent over injected store and fetcher implementations
    pub fn with_parts(
        cache: CacheConfig,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn NetworkFetch>,
    ) -> Self {
        let clients = Arc::new(ClientRegistry::new());
        let interceptor = RequestInterceptor::new(
            cache.version.clone(),
            Arc::clone(&store),
            Arc::clone(&fetcher),
        );
        let lifecycle = LifecycleController::new(cache, store, fetcher, Arc::clone(&clients));
        Self {
            lifecycle,
            interceptor,
            clients,
        }
    }

    /// The current cache version
    pub fn version(&self) -> &str {
        self.lifecycle.version()
    }

    /// The registry of open client contexts
    pub fn clients(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.clients)
    }

    /// Current lifecycle state
    pub async fn state(&self) -> WorkerState {
        self.lifecycle.state().await
    }

    /// Run the install transition
    pub async fn install(&self) -> OfflineResult<()> {
        self.lifecycle.install().await
    }

    /// Run the activate transition
    pub async fn activate(&self) -> OfflineResult<()> {
        self.lifecycle.activate().await
    }

    /// Intercept one request; `None` declines in favor of default handling
    pub async fn handle_fetch(&self, request: &Request) -> Option<Response> {
        self.interceptor.intercept(request).await
    }

    /// Consume host events until the channel closes
    ///
    /// Lifecycle events are awaited inline, which preserves the
    /// install → activate → interception ordering the platform guarantees;
    /// fetch events are dispatched as independent tasks and complete in
    /// any order.
    pub async fn serve(self: Arc<Self>, mut events: mpsc::Receiver<HostEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                HostEvent::Install { done } => {
                    let _ = done.send(self.install().await);
                }
                HostEvent::Activate { done } => {
                    let _ = done.send(self.activate().await);
                }
                HostEvent::Fetch {
                    request,
                    respond_to,
                } => {
                    let agent = Arc::clone(&self);
                    tokio::spawn(async move {
                        let outcome = agent.handle_fetch(&request).await;
                        if respond_to.send(outcome).is_err() {
                            debug!("Fetch requester went away: {}", request.url);
                        }
                    });
                }
            }
        }
    }
}
