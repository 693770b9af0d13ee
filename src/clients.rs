//! Open client contexts and controller tracking
//!
//! The platform reports which pages are open and which worker version
//! controls each one. The registry backs two lifecycle side effects:
//! activation claims every open client for the current version, and the
//! skip-waiting check consults how many clients an older version still
//! controls.

use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Identifier for an open client context (a page, a worker)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Registry of open clients and the cache version controlling each
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<BTreeMap<ClientId, Option<String>>>,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, uncontrolled client
    pub async fn connect(&self) -> ClientId {
        let id = ClientId::new();
        self.clients.write().await.insert(id, None);
        id
    }

    /// Register a client already controlled by the given version
    pub async fn connect_controlled(&self, version: &str) -> ClientId {
        let id = ClientId::new();
        self.clients
            .write()
            .await
            .insert(id, Some(version.to_string()));
        id
    }

    /// Remove a client (page closed)
    pub async fn disconnect(&self, id: ClientId) {
        self.clients.write().await.remove(&id);
    }

    /// The version controlling a client, if any
    pub async fn controller(&self, id: ClientId) -> Option<String> {
        self.clients.read().await.get(&id).cloned().flatten()
    }

    /// Take control of every open client for the given version
    ///
    /// Returns how many clients changed controller.
    pub async fn claim(&self, version: &str) -> usize {
        let mut clients = self.clients.write().await;
        let mut claimed = 0;
        for controller in clients.values_mut() {
            if controller.as_deref() != Some(version) {
                *controller = Some(version.to_string());
                claimed += 1;
            }
        }
        claimed
    }

    /// Count clients still controlled by a version other than the given one
    pub async fn controlled_by_other(&self, version: &str) -> usize {
        self.clients
            .read()
            .await
            .values()
            .filter(|controller| {
                controller
                    .as_deref()
                    .is_some_and(|v| v != version)
            })
            .count()
    }

    /// Number of open clients
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Whether no clients are open
    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}
