//! Request and response model for intercepted traffic
//!
//! Mirrors the subset of the platform fetch model the agent needs: request
//! mode (navigation detection), redirect handling, response origin
//! classification, and the normalized identity used as a cache key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
}

impl Method {
    /// Convert to the wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request mode
///
/// Only `Navigate` changes agent behavior (navigations bypass the cache);
/// the other modes feed response classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    SameOrigin,
    NoCors,
    Cors,
    Navigate,
}

impl RequestMode {
    /// Whether this is a top-level page navigation
    pub fn is_navigation(&self) -> bool {
        matches!(self, Self::Navigate)
    }
}

/// Redirect handling for a network fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    /// Follow redirect chains transparently
    Follow,
    /// Fail the fetch on any redirect
    Error,
    /// Surface the redirect response without following it
    Manual,
}

/// An outgoing request as seen by the interception layer
///
/// Bodies are deliberately absent: the cache identity ignores them, and the
/// agent never replays request bodies.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub mode: RequestMode,
    pub redirect: Redirect,
}

impl Request {
    /// Create a plain GET request (the common case for static assets)
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            headers: BTreeMap::new(),
            mode: RequestMode::NoCors,
            redirect: Redirect::Follow,
        }
    }

    /// Create a top-level navigation request
    pub fn navigation(url: impl Into<String>) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }

    /// Normalized cache identity: method + URL with the fragment stripped
    ///
    /// The request body never participates, so two requests to the same URL
    /// with different bodies share one cache slot.
    pub fn cache_key(&self) -> String {
        let url = match self.url.find('#') {
            Some(pos) => &self.url[..pos],
            None => &self.url,
        };
        format!("{}:{}", self.method.as_str(), url)
    }

    /// Check whether the URL carries the named query parameter
    pub fn has_query_param(&self, name: &str) -> bool {
        let url = match self.url.find('#') {
            Some(pos) => &self.url[..pos],
            None => self.url.as_str(),
        };
        let query = match url.find('?') {
            Some(pos) => &url[pos + 1..],
            None => return false,
        };
        query
            .split('&')
            .map(|pair| pair.split_once('=').map_or(pair, |(k, _)| k))
            .any(|key| key == name)
    }
}

/// Response origin classification
///
/// Matches the platform's response typing: `Basic` is a same-origin
/// response, `Cors` a cross-origin response with readable headers, `Opaque`
/// a cross-origin response to a no-cors request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Basic,
    Cors,
    Opaque,
}

/// A response descriptor with an owned, one-shot body
///
/// The body buffer is consumed by `into_body`. Handing the same response to
/// both the caller and the cache requires an explicit `duplicate` first;
/// there is no implicit sharing.
#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: BTreeMap<String, String>,
    kind: ResponseKind,
    body: Vec<u8>,
}

impl Response {
    /// Create a response
    pub fn new(status: u16, kind: ResponseKind, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            kind,
            body,
        }
    }

    /// Create a same-origin 200 response (test and pre-cache convenience)
    pub fn basic_ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, ResponseKind::Basic, body.into())
    }

    /// Attach a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replace the full header map
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Borrow the body without consuming it
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the response, yielding the body buffer
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Duplicate the response, deep-copying the body
    ///
    /// Required before one copy is consumed by the caller and the other is
    /// handed to the cache store.
    pub fn duplicate(&self) -> Self {
        Self {
            status: self.status,
            headers: self.headers.clone(),
            kind: self.kind,
            body: self.body.clone(),
        }
    }

    /// Whether this response may enter the cache: status exactly 200 and a
    /// same-origin classification
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind == ResponseKind::Basic
    }
}
