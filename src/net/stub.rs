//! In-process network used by tests.

use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{Network, Request, Response};

/// Serves canned responses by URL and records every fetch.
///
/// Unknown URLs answer 404. While offline (or for URLs marked unreachable)
/// every fetch fails.
#[derive(Default)]
pub struct StubNetwork {
  routes: Mutex<HashMap<String, Response>>,
  unreachable: Mutex<HashSet<String>>,
  offline: AtomicBool,
  calls: Mutex<Vec<String>>,
}

impl StubNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_route(self, url: &str, response: Response) -> Self {
    self.route(url, response);
    self
  }

  pub fn route(&self, url: &str, response: Response) {
    self
      .routes
      .lock()
      .unwrap()
      .insert(url.to_string(), response);
  }

  pub fn set_unreachable(&self, url: &str) {
    self.unreachable.lock().unwrap().insert(url.to_string());
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

impl Network for StubNetwork {
  fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response>> {
    async move {
      let url = request.url.to_string();
      self.calls.lock().unwrap().push(url.clone());

      if self.offline.load(Ordering::SeqCst) || self.unreachable.lock().unwrap().contains(&url) {
        return Err(eyre!("Failed to fetch {}: network unreachable", url));
      }

      let response = self
        .routes
        .lock()
        .unwrap()
        .get(&url)
        .cloned()
        .unwrap_or_else(|| Response::new(404, "Not Found"));
      Ok(response)
    }
    .boxed()
  }
}
