//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::traits::{CachedResponse, RequestKey};
use crate::net::Response;

/// Trait for named cache store backends.
pub trait CacheStorage: Send + Sync {
  /// Open (or create) the named store.
  fn open(&self, cache_name: &str) -> Result<()>;

  /// Names of all existing stores, oldest first.
  fn keys(&self) -> Result<Vec<String>>;

  /// Delete a store and all its entries. Returns whether it existed.
  fn delete(&self, cache_name: &str) -> Result<bool>;

  /// Look up a response by exact request identity.
  fn match_request(&self, cache_name: &str, key: &RequestKey) -> Result<Option<CachedResponse>>;

  /// Store a response, replacing any previous entry for the same identity.
  fn put(&self, cache_name: &str, key: &RequestKey, response: &Response) -> Result<()>;

  /// Store several responses at once; either all are written or none.
  fn put_all(&self, cache_name: &str, entries: &[(RequestKey, Response)]) -> Result<()>;

  /// Number of entries in the named store.
  fn entry_count(&self, cache_name: &str) -> Result<usize>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Create a new SQLite storage at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Create a new SQLite storage at the given path.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Create a storage that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("shellcache").join("cache.db"))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- One row per named store
CREATE TABLE IF NOT EXISTS caches (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored responses keyed by request identity
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_name TEXT NOT NULL,
    request_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    status_text TEXT NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (cache_name, request_hash),
    FOREIGN KEY (cache_name) REFERENCES caches(name) ON DELETE CASCADE
);
"#;

fn insert_cache(conn: &Connection, cache_name: &str) -> Result<()> {
  conn
    .execute(
      "INSERT OR IGNORE INTO caches (name) VALUES (?)",
      params![cache_name],
    )
    .map_err(|e| eyre!("Failed to open cache {}: {}", cache_name, e))?;
  Ok(())
}

fn insert_entry(
  conn: &Connection,
  cache_name: &str,
  key: &RequestKey,
  response: &Response,
) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

  conn
    .execute(
      "INSERT OR REPLACE INTO cache_entries
         (cache_name, request_hash, method, url, status, status_text, headers, body, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
      params![
        cache_name,
        key.cache_hash(),
        key.method(),
        key.url(),
        response.status,
        response.status_text,
        headers,
        response.body,
      ],
    )
    .map_err(|e| eyre!("Failed to store {}: {}", key.url(), e))?;

  Ok(())
}

impl CacheStorage for SqliteStorage {
  fn open(&self, cache_name: &str) -> Result<()> {
    let conn = self.lock()?;
    insert_cache(&conn, cache_name)
  }

  fn keys(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT name FROM caches ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list caches: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache name: {}", e))?;

    Ok(names)
  }

  fn delete(&self, cache_name: &str) -> Result<bool> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM cache_entries WHERE cache_name = ?",
      params![cache_name],
    )
    .map_err(|e| eyre!("Failed to delete entries of {}: {}", cache_name, e))?;
    let removed = tx
      .execute("DELETE FROM caches WHERE name = ?", params![cache_name])
      .map_err(|e| eyre!("Failed to delete cache {}: {}", cache_name, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn match_request(&self, cache_name: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare(
        "SELECT status, status_text, headers, body, cached_at FROM cache_entries
         WHERE cache_name = ? AND request_hash = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(u16, String, String, Vec<u8>, String)> = stmt
      .query_row(params![cache_name, key.cache_hash()], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
      })
      .optional()
      .map_err(|e| eyre!("Failed to look up {}: {}", key.url(), e))?;

    match row {
      Some((status, status_text, headers, body, cached_at_str)) => {
        let headers = serde_json::from_str(&headers)
          .map_err(|e| eyre!("Failed to deserialize headers: {}", e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedResponse {
          response: Response {
            status,
            status_text,
            headers,
            body,
          },
          cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn put(&self, cache_name: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let conn = self.lock()?;
    insert_cache(&conn, cache_name)?;
    insert_entry(&conn, cache_name, key, response)
  }

  fn put_all(&self, cache_name: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    insert_cache(&tx, cache_name)?;
    for (key, response) in entries {
      insert_entry(&tx, cache_name, key, response)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn entry_count(&self, cache_name: &str) -> Result<usize> {
    let conn = self.lock()?;
    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE cache_name = ?",
        params![cache_name],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count entries of {}: {}", cache_name, e))?;

    Ok(count as usize)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  fn key(url: &str) -> RequestKey {
    RequestKey::get(&Url::parse(url).unwrap())
  }

  #[test]
  fn test_open_and_keys_in_creation_order() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.open("pos-v1").unwrap();
    storage.open("pos-v2").unwrap();
    storage.open("pos-v1").unwrap();

    assert_eq!(storage.keys().unwrap(), vec!["pos-v1", "pos-v2"]);
  }

  #[test]
  fn test_put_then_match() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let response = Response::ok("<html></html>").with_header("Content-Type", "text/html");

    storage
      .put("pos-v1", &key("http://pos.local/index.html"), &response)
      .unwrap();

    let cached = storage
      .match_request("pos-v1", &key("http://pos.local/index.html"))
      .unwrap()
      .expect("entry should be stored");
    assert_eq!(cached.response, response);
    assert!(cached.cached_at <= Utc::now());

    // put implicitly creates the store
    assert_eq!(storage.keys().unwrap(), vec!["pos-v1"]);
  }

  #[test]
  fn test_match_is_scoped_to_cache_name() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .put("pos-v1", &key("http://pos.local/"), &Response::ok("old"))
      .unwrap();

    assert!(storage
      .match_request("pos-v2", &key("http://pos.local/"))
      .unwrap()
      .is_none());
  }

  #[test]
  fn test_put_replaces_existing_entry() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let k = key("http://pos.local/manifest.json");
    storage.put("pos-v1", &k, &Response::ok("first")).unwrap();
    storage.put("pos-v1", &k, &Response::ok("second")).unwrap();

    let cached = storage.match_request("pos-v1", &k).unwrap().unwrap();
    assert_eq!(cached.response.body, b"second");
    assert_eq!(storage.entry_count("pos-v1").unwrap(), 1);
  }

  #[test]
  fn test_delete_removes_store_and_entries() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .put("pos-v1", &key("http://pos.local/"), &Response::ok("shell"))
      .unwrap();
    storage.open("pos-v2").unwrap();

    assert!(storage.delete("pos-v1").unwrap());
    assert!(!storage.delete("pos-v1").unwrap());
    assert_eq!(storage.keys().unwrap(), vec!["pos-v2"]);
    assert_eq!(storage.entry_count("pos-v1").unwrap(), 0);
  }

  #[test]
  fn test_put_all_writes_every_entry() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let entries = vec![
      (key("http://pos.local/"), Response::ok("root")),
      (key("http://pos.local/index.html"), Response::ok("index")),
      (key("http://pos.local/manifest.json"), Response::ok("{}")),
    ];

    storage.put_all("pos-v1", &entries).unwrap();

    assert_eq!(storage.entry_count("pos-v1").unwrap(), 3);
    for (k, response) in &entries {
      let cached = storage.match_request("pos-v1", k).unwrap().unwrap();
      assert_eq!(&cached.response, response);
    }
  }

  #[test]
  fn test_file_backed_storage_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");

    {
      let storage = SqliteStorage::open_at(&path).unwrap();
      storage
        .put("pos-v1", &key("http://pos.local/"), &Response::ok("shell"))
        .unwrap();
    }

    let reopened = SqliteStorage::open_at(&path).unwrap();
    assert_eq!(reopened.keys().unwrap(), vec!["pos-v1"]);
    assert!(reopened
      .match_request("pos-v1", &key("http://pos.local/"))
      .unwrap()
      .is_some());
  }
}
