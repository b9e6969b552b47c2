//! Cache layer that orchestrates cache-first lookup with network fetching.

use color_eyre::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::storage::CacheStorage;
use super::traits::{CacheResult, RequestKey};
use crate::config::OfflinePolicy;
use crate::net::{Request, Response};

/// What to serve when the network fails on a cache miss.
#[derive(Debug, Clone)]
pub struct OfflineFallback {
  /// Identity of the shell page served for failed navigations
  pub shell: Option<RequestKey>,
  pub policy: OfflinePolicy,
}

/// Cache layer bound to one named store.
///
/// This layer sits between the proxy and the network, providing
/// cache-first lookup with offline support.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  cache_name: String,
  fallback: OfflineFallback,
}

impl<S: CacheStorage> CacheLayer<S> {
  pub fn new(storage: Arc<S>, cache_name: impl Into<String>, fallback: OfflineFallback) -> Self {
    Self {
      storage,
      cache_name: cache_name.into(),
      fallback,
    }
  }

  pub fn cache_name(&self) -> &str {
    &self.cache_name
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Write a complete set of responses to the store in one step.
  pub fn store_all(&self, entries: &[(RequestKey, Response)]) -> Result<()> {
    self.storage.open(&self.cache_name)?;
    self.storage.put_all(&self.cache_name, entries)
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Check cache - on an exact hit, return immediately
  /// 2. On a miss, fetch from network
  /// 3. Store 200 responses for future hits
  /// 4. On network failure, serve the shell page or the offline policy
  pub async fn fetch<F, Fut>(&self, request: &Request, fetcher: F) -> Result<CacheResult<Response>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Response>>,
  {
    let key = RequestKey::from_request(request);

    if let Some(cached) = self.storage.match_request(&self.cache_name, &key)? {
      debug!(url = %request.url, "Serving from cache");
      return Ok(CacheResult::from_cache(cached.response, cached.cached_at));
    }

    match fetcher().await {
      Ok(response) => {
        if response.status == 200 {
          // A failed write never fails the response
          if let Err(e) = self.storage.put(&self.cache_name, &key, &response) {
            warn!(url = %request.url, error = %e, "Failed to cache network response");
          }
        }
        Ok(CacheResult::from_network(response))
      }
      Err(err) => {
        info!(url = %request.url, "Network failed");
        self.offline_fallback(request, err)
      }
    }
  }

  fn offline_fallback(
    &self,
    request: &Request,
    err: color_eyre::Report,
  ) -> Result<CacheResult<Response>> {
    if request.is_navigation() {
      if let Some(shell_key) = &self.fallback.shell {
        match self.storage.match_request(&self.cache_name, shell_key)? {
          Some(shell) => {
            debug!(url = %request.url, shell = shell_key.url(), "Serving cached shell page");
            return Ok(CacheResult::shell_fallback(shell.response, shell.cached_at));
          }
          None => warn!(shell = shell_key.url(), "Shell page is not cached"),
        }
      }
    }

    match self.fallback.policy {
      OfflinePolicy::Synthesize => Ok(CacheResult::offline(Response::offline())),
      OfflinePolicy::Propagate => Err(err.wrap_err(format!("Offline: {}", request.url))),
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      cache_name: self.cache_name.clone(),
      fallback: self.fallback.clone(),
    }
  }
}
