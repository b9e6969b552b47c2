//! The offline cache proxy and its lifecycle handlers.

use color_eyre::{eyre::eyre, eyre::WrapErr, Result};
use futures::future::join_all;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info};

use super::message::ControlMessage;
use crate::cache::{CacheLayer, CacheResult, CacheStorage, OfflineFallback, RequestKey};
use crate::config::ProxyConfig;
use crate::net::{Network, Request, Response};

/// Lifecycle phases the proxy moves through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkerState {
  /// Constructed, not yet installed
  #[default]
  Parsed,
  Installing,
  /// Core assets cached, waiting to activate
  Installed,
  Activating,
  /// Old stores swept, clients controlled
  Activated,
}

impl std::fmt::Display for WorkerState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      WorkerState::Parsed => write!(f, "parsed"),
      WorkerState::Installing => write!(f, "installing"),
      WorkerState::Installed => write!(f, "installed"),
      WorkerState::Activating => write!(f, "activating"),
      WorkerState::Activated => write!(f, "activated"),
    }
  }
}

/// Lifecycle signals raised by the handlers, observed by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lifecycle {
  pub state: WorkerState,
  /// Activate without waiting for existing pages to close
  pub skip_waiting: bool,
  /// Requests from already-open pages are intercepted too
  pub clients_claimed: bool,
}

impl std::fmt::Display for Lifecycle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "state={} skip_waiting={} clients_claimed={}",
      self.state, self.skip_waiting, self.clients_claimed
    )
  }
}

/// Outcome of intercepting one request.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
  /// Not intercepted; the host sends the request straight to the network
  Passthrough,
  /// The proxy answers with this response
  Respond(CacheResult<Response>),
}

/// Offline cache proxy: install, activate, intercept and message handlers
/// over one named store.
pub struct OfflineCacheProxy<S: CacheStorage, N: Network> {
  config: Arc<ProxyConfig>,
  cache: CacheLayer<S>,
  network: Arc<N>,
  lifecycle: Arc<Mutex<Lifecycle>>,
}

impl<S: CacheStorage, N: Network> OfflineCacheProxy<S, N> {
  pub fn new(config: ProxyConfig, storage: Arc<S>, network: Arc<N>) -> Result<Self> {
    config.validate()?;

    let shell = config
      .navigation_fallback_path
      .as_deref()
      .map(|path| config.resolve(path).map(|url| RequestKey::get(&url)))
      .transpose()?;
    let fallback = OfflineFallback {
      shell,
      policy: config.offline_policy,
    };
    let cache = CacheLayer::new(storage, config.cache_version_name.clone(), fallback);

    Ok(Self {
      config: Arc::new(config),
      cache,
      network,
      lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
    })
  }

  pub fn config(&self) -> &ProxyConfig {
    &self.config
  }

  pub fn storage(&self) -> &S {
    self.cache.storage()
  }

  /// Current lifecycle signals.
  pub fn lifecycle(&self) -> Result<Lifecycle> {
    Ok(*self.lock_lifecycle()?)
  }

  fn lock_lifecycle(&self) -> Result<MutexGuard<'_, Lifecycle>> {
    self
      .lifecycle
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  fn set_state(&self, state: WorkerState) -> Result<()> {
    let mut lifecycle = self.lock_lifecycle()?;
    debug!(from = %lifecycle.state, to = %state, "Lifecycle transition");
    lifecycle.state = state;
    Ok(())
  }

  /// Install handler: cache every core asset, then skip waiting.
  ///
  /// Population is all-or-nothing. If any core asset can't be fetched the
  /// install fails and nothing is written.
  pub async fn install(&self) -> Result<()> {
    let previous = self.lifecycle()?.state;
    self.set_state(WorkerState::Installing)?;
    info!(cache = self.cache.cache_name(), "Installing and caching core assets");

    match self.populate_core_assets().await {
      Ok(count) => {
        info!(count, "Core assets cached successfully");
        let mut lifecycle = self.lock_lifecycle()?;
        lifecycle.state = WorkerState::Installed;
        lifecycle.skip_waiting = true;
        Ok(())
      }
      Err(e) => {
        error!(error = %e, "Failed to cache core assets");
        self.set_state(previous)?;
        Err(e)
      }
    }
  }

  /// Fetch every core asset and write them to the store in one step.
  async fn populate_core_assets(&self) -> Result<usize> {
    let requests = self
      .config
      .core_asset_paths
      .iter()
      .map(|path| self.config.resolve(path).map(Request::get))
      .collect::<Result<Vec<_>>>()?;

    let responses = join_all(requests.iter().map(|request| self.network.fetch(request))).await;

    let mut entries = Vec::with_capacity(requests.len());
    for (request, response) in requests.iter().zip(responses) {
      let response =
        response.wrap_err_with(|| format!("Failed to fetch core asset {}", request.url))?;
      if !response.is_ok() {
        return Err(eyre!(
          "Core asset {} returned status {}",
          request.url,
          response.status
        ));
      }
      entries.push((RequestKey::from_request(request), response));
    }

    self.cache.store_all(&entries)?;
    Ok(entries.len())
  }

  /// Activate handler: delete every store but the current one, then claim
  /// all clients. Returns the names of the deleted stores.
  pub async fn activate(&self) -> Result<Vec<String>> {
    let previous = self.lifecycle()?.state;
    self.set_state(WorkerState::Activating)?;
    info!("Activating");

    let deleted = match self.delete_old_caches() {
      Ok(deleted) => deleted,
      Err(e) => {
        error!(error = %e, "Failed to delete old caches");
        self.set_state(previous)?;
        return Err(e);
      }
    };

    info!("Taking control of all clients");
    let mut lifecycle = self.lock_lifecycle()?;
    lifecycle.clients_claimed = true;
    lifecycle.state = WorkerState::Activated;

    Ok(deleted)
  }

  fn delete_old_caches(&self) -> Result<Vec<String>> {
    let current = self.cache.cache_name();
    let mut deleted = Vec::new();
    for name in self.storage().keys()? {
      if name != current {
        info!(cache = %name, "Deleting old cache");
        self.storage().delete(&name)?;
        deleted.push(name);
      }
    }
    Ok(deleted)
  }

  /// Fetch handler.
  ///
  /// Non-GET requests and requests to bypassed backends are passed through
  /// without touching the store. Everything else is served cache-first.
  pub async fn intercept(&self, request: &Request) -> Result<FetchOutcome> {
    if !request.is_get() {
      debug!(method = %request.method, url = %request.url, "Passing through non-GET request");
      return Ok(FetchOutcome::Passthrough);
    }

    if self.config.is_bypassed(request.url.as_str()) {
      debug!(url = %request.url, "Passing through bypassed backend request");
      return Ok(FetchOutcome::Passthrough);
    }

    let result = self
      .cache
      .fetch(request, || self.network.fetch(request))
      .await?;

    Ok(FetchOutcome::Respond(result))
  }

  /// Message handler. Unrecognized messages are ignored.
  pub async fn handle_message(&self, data: &Value) -> Result<Option<ControlMessage>> {
    let message = match ControlMessage::parse(data) {
      Some(message) => message,
      None => {
        debug!(%data, "Ignoring unrecognized message");
        return Ok(None);
      }
    };

    match message {
      ControlMessage::UpdateCache => {
        info!("Refreshing core asset cache");
        let count = self.populate_core_assets().await.inspect_err(|e| {
          error!(error = %e, "Failed to refresh core assets");
        })?;
        info!(count, "Core assets refreshed");
      }
      ControlMessage::SkipWaiting => {
        info!("Skipping the waiting phase");
        self.lock_lifecycle()?.skip_waiting = true;
      }
      ControlMessage::Unknown => {}
    }

    Ok(Some(message))
  }
}

impl<S: CacheStorage, N: Network> Clone for OfflineCacheProxy<S, N> {
  fn clone(&self) -> Self {
    Self {
      config: Arc::clone(&self.config),
      cache: self.cache.clone(),
      network: Arc::clone(&self.network),
      lifecycle: Arc::clone(&self.lifecycle),
    }
  }
}
