//! Network fetch for intercepted requests
//!
//! `NetworkFetch` is the injectable seam the policy and lifecycle code talk
//! to; `HttpFetcher` is the shipped implementation, driving ureq on the
//! blocking thread pool. Root-relative paths resolve against the deployment
//! origin, which also decides the basic/cors/opaque classification.

use crate::error::{OfflineError, OfflineResult};
use crate::http::{Method, Redirect, Request, RequestMode, Response, ResponseKind};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

/// Abstract network access
///
/// The agent imposes no timeouts and models no cancellation; a fetch runs
/// to completion or failure under the transport's own rules.
#[async_trait]
pub trait NetworkFetch: Send + Sync {
    /// Perform the request, following redirects per its redirect mode
    async fn fetch(&self, request: &Request) -> OfflineResult<Response>;
}

/// ureq-backed fetcher
///
/// Request bodies are not modeled by the interception layer, so
/// body-carrying methods are refused here; the host's default pass-through
/// performs those itself.
pub struct HttpFetcher {
    origin: String,
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Create a fetcher for the given deployment origin
    pub fn new(origin: impl Into<String>) -> Self {
        // Non-2xx statuses must surface as responses, not errors: the
        // policy inspects them to decide against caching.
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            origin: origin.into(),
            agent,
        }
    }

    /// Resolve a root-relative path against the deployment origin
    fn resolve_url(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!("{}{}", self.origin, url)
        } else {
            url.to_string()
        }
    }

    fn is_same_origin(&self, url: &str) -> bool {
        match url.strip_prefix(self.origin.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
            None => false,
        }
    }

    /// Classify a response by its target origin and the request mode
    fn classify(&self, url: &str, mode: RequestMode) -> ResponseKind {
        if self.is_same_origin(url) {
            ResponseKind::Basic
        } else if mode == RequestMode::NoCors {
            ResponseKind::Opaque
        } else {
            ResponseKind::Cors
        }
    }
}

#[async_trait]
impl NetworkFetch for HttpFetcher {
    async fn fetch(&self, request: &Request) -> OfflineResult<Response> {
        let url = self.resolve_url(&request.url);
        let kind = self.classify(&url, request.mode);
        let method = request.method;
        let redirect = request.redirect;
        let headers = request.headers.clone();
        let agent = self.agent.clone();

        debug!("Fetching from network: {}", url);

        let fetch_url = url.clone();
        tokio::task::spawn_blocking(move || {
            perform(&agent, method, &fetch_url, &headers, redirect, kind)
        })
        .await
        .map_err(|e| OfflineError::Internal(format!("fetch task failed: {e}")))?
    }
}

/// Blocking fetch body, run on the blocking pool
fn perform(
    agent: &ureq::Agent,
    method: Method,
    url: &str,
    headers: &BTreeMap<String, String>,
    redirect: Redirect,
    kind: ResponseKind,
) -> OfflineResult<Response> {
    let mut builder = match method {
        Method::Get => agent.get(url),
        Method::Head => agent.head(url),
        Method::Delete => agent.delete(url),
        other => {
            return Err(OfflineError::UnsupportedMethod {
                method: other.to_string(),
                url: url.to_string(),
            })
        }
    };

    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    // Manual and error modes both stop the client from following; error
    // mode additionally fails on a redirect status below.
    if redirect != Redirect::Follow {
        builder = builder.config().max_redirects(0).build();
    }

    let mut response = builder
        .call()
        .map_err(|e| OfflineError::fetch(url, e.to_string()))?;

    let status = response.status().as_u16();
    if redirect == Redirect::Error && (300..400).contains(&status) {
        return Err(OfflineError::fetch(
            url,
            format!("unexpected redirect ({status})"),
        ));
    }

    let mut header_map = BTreeMap::new();
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            header_map.insert(name.as_str().to_string(), value.to_string());
        }
    }

    let body = response
        .body_mut()
        .read_to_vec()
        .map_err(|e| OfflineError::fetch(url, format!("reading body: {e}")))?;

    Ok(Response::new(status, kind, body).with_headers(header_map))
}
