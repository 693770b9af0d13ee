//! Integration tests for viltrum-offline

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use viltrum_offline::config::CacheConfig;
use viltrum_offline::error::{OfflineError, OfflineResult};
use viltrum_offline::http::{Request, Response, ResponseKind};
use viltrum_offline::network::NetworkFetch;
use viltrum_offline::store::{CacheStore, MemoryStore};
use viltrum_offline::OfflineAgent;

/// Scripted route outcome
#[derive(Clone, Copy)]
enum Scripted {
    Respond(u16, ResponseKind, &'static str),
    Fail,
}

/// Network double: canned outcomes per URL, every call recorded.
/// Unrouted URLs answer 200/basic with a derived body.
#[derive(Default)]
struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn respond(&self, url: &str, status: u16, kind: ResponseKind, body: &'static str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Scripted::Respond(status, kind, body));
    }

    fn fail(&self, url: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Scripted::Fail);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_for(&self, url: &str) -> usize {
        self.calls().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl NetworkFetch for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> OfflineResult<Response> {
        self.calls.lock().unwrap().push(request.url.clone());
        match self.routes.lock().unwrap().get(&request.url).copied() {
            Some(Scripted::Fail) => Err(OfflineError::fetch(&request.url, "unreachable")),
            Some(Scripted::Respond(status, kind, body)) => {
                Ok(Response::new(status, kind, body.as_bytes().to_vec()))
            }
            None => Ok(Response::basic_ok(format!("content of {}", request.url))),
        }
    }
}

fn agent_with(
    version: &str,
    manifest: &[&str],
    store: Arc<dyn CacheStore>,
    fetcher: Arc<ScriptedFetcher>,
) -> Arc<OfflineAgent> {
    Arc::new(OfflineAgent::with_parts(
        CacheConfig {
            version: version.to_string(),
            precache: manifest.iter().map(|p| p.to_string()).collect(),
        },
        store,
        fetcher,
    ))
}

/// Let fire-and-forget population tasks run to completion
async fn drain() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
    // Disk-backed population finishes on the blocking pool, which the
    // cooperative yields above do not wait for; give it real time to land.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

mod lifecycle_scenarios {
    use super::*;

    #[tokio::test]
    async fn install_failure_then_runtime_population() {
        // /style.css is unreachable at install time, then comes back
        // for a later request.
        let store = Arc::new(MemoryStore::new());
        let fetcher = ScriptedFetcher::new();
        fetcher.fail("/style.css");

        let agent = agent_with(
            "viltrum-fitness-v3",
            &["/", "/style.css"],
            Arc::clone(&store) as Arc<dyn CacheStore>,
            Arc::clone(&fetcher),
        );

        // Installation completes despite the failed manifest fetch
        agent.install().await.unwrap();
        assert_eq!(store.keys("viltrum-fitness-v3").await, vec!["GET:/"]);

        agent.activate().await.unwrap();

        // The resource is reachable again; the miss goes to the network
        fetcher.respond("/style.css", 200, ResponseKind::Basic, "body{}");
        let request = Request::get("/style.css");
        let response = agent.handle_fetch(&request).await.unwrap();
        assert_eq!(response.body(), b"body{}");

        drain().await;
        assert!(store.match_request(&request).await.unwrap().is_some());

        // Future requests are served from cache, without a network trip
        let before = fetcher.calls_for("/style.css");
        let cached = agent.handle_fetch(&request).await.unwrap();
        assert_eq!(cached.body(), b"body{}");
        assert_eq!(fetcher.calls_for("/style.css"), before);
    }

    #[tokio::test]
    async fn activation_deletes_every_stale_version() {
        let store = Arc::new(MemoryStore::new());
        for version in ["viltrum-fitness-v1", "viltrum-fitness-v2", "viltrum-fitness-v3"] {
            store.open(version).await.unwrap();
        }

        let agent = agent_with(
            "viltrum-fitness-v3",
            &[],
            Arc::clone(&store) as Arc<dyn CacheStore>,
            ScriptedFetcher::new(),
        );
        agent.install().await.unwrap();
        agent.activate().await.unwrap();

        assert_eq!(store.versions().await.unwrap(), vec!["viltrum-fitness-v3"]);
    }

    #[tokio::test]
    async fn repeated_activation_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        store.open("viltrum-fitness-v2").await.unwrap();

        let agent = agent_with(
            "viltrum-fitness-v3",
            &["/", "/index.html"],
            Arc::clone(&store) as Arc<dyn CacheStore>,
            ScriptedFetcher::new(),
        );
        agent.install().await.unwrap();

        agent.activate().await.unwrap();
        let versions_once = store.versions().await.unwrap();
        let keys_once = store.keys("viltrum-fitness-v3").await;

        agent.activate().await.unwrap();

        assert_eq!(store.versions().await.unwrap(), versions_once);
        assert_eq!(store.keys("viltrum-fitness-v3").await, keys_once);
    }
}

mod interception_scenarios {
    use super::*;

    async fn activated_agent(
        store: Arc<dyn CacheStore>,
        fetcher: Arc<ScriptedFetcher>,
    ) -> Arc<OfflineAgent> {
        let agent = agent_with("viltrum-fitness-v3", &[], store, fetcher);
        agent.install().await.unwrap();
        agent.activate().await.unwrap();
        agent
    }

    #[tokio::test]
    async fn auth_flows_never_touch_the_cache() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = ScriptedFetcher::new();
        let agent = activated_agent(
            Arc::clone(&store) as Arc<dyn CacheStore>,
            Arc::clone(&fetcher),
        )
        .await;

        for url in [
            "/callback?access_token=eyJh",
            "/callback?refresh_token=eyJh",
            "/reset?type=recovery",
        ] {
            assert!(agent.handle_fetch(&Request::get(url)).await.is_none());
        }

        drain().await;
        // Declined requests hit neither the network nor the store
        assert!(fetcher.calls().is_empty());
        assert_eq!(store.entry_count("viltrum-fitness-v3").await, 0);
    }

    #[tokio::test]
    async fn navigation_is_never_served_from_cache() {
        let store = Arc::new(MemoryStore::new());
        let request = Request::get("/dashboard.html");
        store
            .put("viltrum-fitness-v3", &request, Response::basic_ok("cached"))
            .await
            .unwrap();

        let agent = activated_agent(
            Arc::clone(&store) as Arc<dyn CacheStore>,
            ScriptedFetcher::new(),
        )
        .await;

        let outcome = agent
            .handle_fetch(&Request::navigation("/dashboard.html"))
            .await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn cache_hit_takes_precedence_over_network() {
        let store = Arc::new(MemoryStore::new());
        let request = Request::get("/script.js");
        store
            .put("viltrum-fitness-v3", &request, Response::basic_ok("cached"))
            .await
            .unwrap();

        let fetcher = ScriptedFetcher::new();
        let agent = activated_agent(
            Arc::clone(&store) as Arc<dyn CacheStore>,
            Arc::clone(&fetcher),
        )
        .await;

        let response = agent.handle_fetch(&request).await.unwrap();
        assert_eq!(response.body(), b"cached");
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn only_successful_same_origin_responses_are_stored() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = ScriptedFetcher::new();
        fetcher.respond("/missing.js", 404, ResponseKind::Basic, "not found");
        fetcher.respond(
            "https://cdn.example.com/chart.js",
            200,
            ResponseKind::Cors,
            "chart",
        );
        fetcher.respond("/good.js", 200, ResponseKind::Basic, "good");

        let agent = activated_agent(
            Arc::clone(&store) as Arc<dyn CacheStore>,
            Arc::clone(&fetcher),
        )
        .await;

        // All three return their network response to the caller
        let missing = agent.handle_fetch(&Request::get("/missing.js")).await.unwrap();
        assert_eq!(missing.status(), 404);
        let cdn = agent
            .handle_fetch(&Request::get("https://cdn.example.com/chart.js"))
            .await
            .unwrap();
        assert_eq!(cdn.kind(), ResponseKind::Cors);
        let good = agent.handle_fetch(&Request::get("/good.js")).await.unwrap();
        assert_eq!(good.body(), b"good");

        drain().await;
        // Only the 200/basic response made it into the store
        assert_eq!(store.keys("viltrum-fitness-v3").await, vec!["GET:/good.js"]);
    }

    #[tokio::test]
    async fn network_failure_declines_instead_of_erroring() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = ScriptedFetcher::new();
        fetcher.fail("/offline.js");

        let agent = activated_agent(
            Arc::clone(&store) as Arc<dyn CacheStore>,
            Arc::clone(&fetcher),
        )
        .await;

        assert!(agent.handle_fetch(&Request::get("/offline.js")).await.is_none());
    }
}

mod host_event_scenarios {
    use super::*;
    use tokio::sync::{mpsc, oneshot};
    use viltrum_offline::lifecycle::WorkerState;
    use viltrum_offline::HostEvent;

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[tokio::test]
    async fn full_deployment_over_the_event_channel() {
        init_logging();

        let store = Arc::new(MemoryStore::new());
        store.open("viltrum-fitness-v2").await.unwrap();
        let fetcher = ScriptedFetcher::new();

        let agent = agent_with(
            "viltrum-fitness-v3",
            &["/", "/style.css"],
            Arc::clone(&store) as Arc<dyn CacheStore>,
            Arc::clone(&fetcher),
        );

        let (tx, rx) = mpsc::channel(16);
        let loop_handle = tokio::spawn(Arc::clone(&agent).serve(rx));

        // Install: the completion token resolves only after pre-caching
        let (done_tx, done_rx) = oneshot::channel();
        tx.send(HostEvent::Install { done: done_tx }).await.unwrap();
        done_rx.await.unwrap().unwrap();
        assert_eq!(store.entry_count("viltrum-fitness-v3").await, 2);
        assert_eq!(agent.state().await, WorkerState::Installed);

        // Activate: stale version gone by the time the token resolves
        let (done_tx, done_rx) = oneshot::channel();
        tx.send(HostEvent::Activate { done: done_tx }).await.unwrap();
        done_rx.await.unwrap().unwrap();
        assert_eq!(store.versions().await.unwrap(), vec!["viltrum-fitness-v3"]);

        // Concurrent fetches: one cached, one network, one declined
        let mut receivers = Vec::new();
        for request in [
            Request::get("/style.css"),
            Request::get("/workout.html"),
            Request::get("/login?access_token=tok"),
        ] {
            let (respond_tx, respond_rx) = oneshot::channel();
            tx.send(HostEvent::Fetch {
                request,
                respond_to: respond_tx,
            })
            .await
            .unwrap();
            receivers.push(respond_rx);
        }

        let style = receivers.remove(0).await.unwrap();
        assert!(style.is_some());
        let workout = receivers.remove(0).await.unwrap().unwrap();
        assert_eq!(workout.body(), b"content of /workout.html");
        let login = receivers.remove(0).await.unwrap();
        assert!(login.is_none());

        // The cached hit did not go to the network
        assert_eq!(fetcher.calls_for("/style.css"), 1);

        drop(tx);
        loop_handle.await.unwrap();
    }
}

mod disk_scenarios {
    use super::*;
    use viltrum_offline::store::DiskStore;

    #[tokio::test]
    async fn deployment_upgrade_on_disk() {
        let root = tempfile::TempDir::new().unwrap();

        // First deployment: v3 pre-caches its shell
        {
            let store = Arc::new(DiskStore::new(root.path()));
            let agent = agent_with(
                "viltrum-fitness-v3",
                &["/", "/index.html"],
                store,
                ScriptedFetcher::new(),
            );
            agent.install().await.unwrap();
            agent.activate().await.unwrap();
        }

        // Entries persisted across the restart
        let store = Arc::new(DiskStore::new(root.path()));
        assert!(store
            .match_request(&Request::get("/index.html"))
            .await
            .unwrap()
            .is_some());

        // Second deployment: v4 takes over and collects v3
        let agent = agent_with(
            "viltrum-fitness-v4",
            &["/", "/index.html"],
            Arc::clone(&store) as Arc<dyn CacheStore>,
            ScriptedFetcher::new(),
        );
        agent.install().await.unwrap();
        agent.activate().await.unwrap();

        assert_eq!(store.versions().await.unwrap(), vec!["viltrum-fitness-v4"]);
    }

    #[tokio::test]
    async fn runtime_population_lands_on_disk() {
        let root = tempfile::TempDir::new().unwrap();
        let store = Arc::new(DiskStore::new(root.path()));
        let fetcher = ScriptedFetcher::new();

        let agent = agent_with(
            "viltrum-fitness-v3",
            &[],
            Arc::clone(&store) as Arc<dyn CacheStore>,
            Arc::clone(&fetcher),
        );
        agent.install().await.unwrap();
        agent.activate().await.unwrap();

        let request = Request::get("/nutrition.html");
        agent.handle_fetch(&request).await.unwrap();
        drain().await;

        // A fresh handle over the same root sees the populated entry
        let reopened = DiskStore::new(root.path());
        assert!(reopened.match_request(&request).await.unwrap().is_some());
    }
}
