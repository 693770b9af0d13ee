//! Viltrum Offline - offline caching agent for the Viltrum Fitness app
//!
//! Pre-caches the app shell at install time, garbage-collects stale cache
//! versions at activation, and intercepts requests with a cache-first
//! fetch-and-populate policy.

pub mod agent;
pub mod clients;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod network;
pub mod policy;
pub mod store;

pub use agent::{HostEvent, OfflineAgent};
pub use error::{OfflineError, OfflineResult};
