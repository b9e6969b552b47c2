//! Storage wrapper that fails chosen writes, used by tests.

use color_eyre::{eyre::eyre, Result};
use std::sync::atomic::{AtomicBool, Ordering};

use super::storage::{CacheStorage, SqliteStorage};
use super::traits::{CachedResponse, RequestKey};
use crate::net::Response;

/// In-memory SQLite storage whose `put` and `delete` can be made to fail.
pub struct FaultyStorage {
  inner: SqliteStorage,
  fail_put: AtomicBool,
  fail_delete: AtomicBool,
}

impl FaultyStorage {
  pub fn new() -> Self {
    Self {
      inner: SqliteStorage::open_in_memory().unwrap(),
      fail_put: AtomicBool::new(false),
      fail_delete: AtomicBool::new(false),
    }
  }

  pub fn fail_put(&self, fail: bool) {
    self.fail_put.store(fail, Ordering::SeqCst);
  }

  pub fn fail_delete(&self, fail: bool) {
    self.fail_delete.store(fail, Ordering::SeqCst);
  }
}

impl CacheStorage for FaultyStorage {
  fn open(&self, cache_name: &str) -> Result<()> {
    self.inner.open(cache_name)
  }

  fn keys(&self) -> Result<Vec<String>> {
    self.inner.keys()
  }

  fn delete(&self, cache_name: &str) -> Result<bool> {
    if self.fail_delete.load(Ordering::SeqCst) {
      return Err(eyre!("Failed to delete cache {}: disk I/O error", cache_name));
    }
    self.inner.delete(cache_name)
  }

  fn match_request(&self, cache_name: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    self.inner.match_request(cache_name, key)
  }

  fn put(&self, cache_name: &str, key: &RequestKey, response: &Response) -> Result<()> {
    if self.fail_put.load(Ordering::SeqCst) {
      return Err(eyre!("Failed to store {}: quota exceeded", key.url()));
    }
    self.inner.put(cache_name, key, response)
  }

  fn put_all(&self, cache_name: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
    self.inner.put_all(cache_name, entries)
  }

  fn entry_count(&self, cache_name: &str) -> Result<usize> {
    self.inner.entry_count(cache_name)
  }
}
