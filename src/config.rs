use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// What the proxy returns when a non-navigation request misses the cache
/// and the network is unreachable.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OfflinePolicy {
  /// Answer with a synthesized `503 Offline` response
  #[default]
  Synthesize,
  /// Re-raise the network failure to the caller
  Propagate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
  /// Name of the current cache store; changing it retires older stores on activation
  pub cache_version_name: String,
  /// Paths guaranteed to be cached after a successful install
  pub core_asset_paths: Vec<String>,
  /// URL substrings of backends whose requests are never intercepted
  pub bypass_url_substrings: Vec<String>,
  /// Cached page served in place of a failed navigation
  pub navigation_fallback_path: Option<String>,
  /// Origin that relative asset paths are resolved against
  pub origin: String,
  pub offline_policy: OfflinePolicy,
  /// Per-request timeout for live fetches (none by default)
  pub request_timeout_secs: Option<u64>,
}

impl Default for ProxyConfig {
  fn default() -> Self {
    Self {
      cache_version_name: "strada-pos-offline-v1".to_string(),
      core_asset_paths: [
        "/",
        "/index.html",
        "/manifest.json",
        "/main.dart.js",
        "/flutter_service_worker.js",
        "/assets/FontManifest.json",
        "/assets/AssetManifest.json",
        "/assets/fonts/MaterialIcons-Regular.otf",
      ]
      .iter()
      .map(|p| p.to_string())
      .collect(),
      bypass_url_substrings: ["firestore.googleapis.com", "firebase", "googleapis.com"]
        .iter()
        .map(|s| s.to_string())
        .collect(),
      navigation_fallback_path: Some("/index.html".to_string()),
      origin: "http://localhost:8080".to_string(),
      offline_policy: OfflinePolicy::default(),
      request_timeout_secs: None,
    }
  }
}

impl ProxyConfig {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./shellcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/shellcache/config.yaml
  ///
  /// Built-in defaults are used when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        tracing::debug!("No configuration file found, using defaults");
        Self::default()
      }
    };

    let config = config.with_origin_override(std::env::var("SHELLCACHE_ORIGIN").ok());
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("shellcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("shellcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: ProxyConfig = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    tracing::debug!(path = %path.display(), "Loaded configuration");
    Ok(config)
  }

  /// Replace the origin when an override is given.
  pub fn with_origin_override(self, origin: Option<String>) -> Self {
    match origin {
      Some(origin) => Self { origin, ..self },
      None => self,
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.cache_version_name.trim().is_empty() {
      return Err(eyre!("cache_version_name must not be empty"));
    }
    let origin = self.origin_url()?;
    if origin.cannot_be_a_base() {
      return Err(eyre!("origin must be a base URL: {}", self.origin));
    }
    for path in &self.core_asset_paths {
      self.resolve(path)?;
    }
    Ok(())
  }

  pub fn origin_url(&self) -> Result<Url> {
    Url::parse(&self.origin).map_err(|e| eyre!("Invalid origin {}: {}", self.origin, e))
  }

  /// Resolve a path (or absolute URL) against the configured origin.
  pub fn resolve(&self, path: &str) -> Result<Url> {
    self
      .origin_url()?
      .join(path)
      .map_err(|e| eyre!("Invalid asset path {}: {}", path, e))
  }

  /// Whether a URL belongs to a backend the proxy must never shadow.
  pub fn is_bypassed(&self, url: &str) -> bool {
    self
      .bypass_url_substrings
      .iter()
      .any(|pattern| url.contains(pattern.as_str()))
  }
}
