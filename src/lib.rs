//! shellcache: an offline cache proxy for web application shells.
//!
//! Requests are served cache-first from a single named, versioned store;
//! installing a version caches its core assets, activating it retires every
//! other store.

pub mod cache;
pub mod config;
pub mod logging;
pub mod net;
pub mod proxy;
