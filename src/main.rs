use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use shellcache::cache::{CacheStorage, SqliteStorage};
use shellcache::config::ProxyConfig;
use shellcache::net::{HttpNetwork, Network, Request};
use shellcache::proxy::{FetchOutcome, OfflineCacheProxy};

#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(about = "An offline cache proxy for web application shells")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/shellcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Path to the cache database (default: $XDG_DATA_HOME/shellcache/cache.db)
  #[arg(long)]
  db: Option<PathBuf>,

  /// Origin that asset paths resolve against
  #[arg(short, long)]
  origin: Option<String>,

  /// Enable debug logging
  #[arg(long)]
  debug: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Cache every core asset for the current version
  Install,
  /// Delete caches from other versions
  Activate,
  /// Intercept a single request and write the response body to stdout
  Fetch {
    /// URL or origin-relative path
    target: String,
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,
    /// Treat the request as a page navigation
    #[arg(long)]
    navigate: bool,
    /// Accept header to send
    #[arg(long)]
    accept: Option<String>,
  },
  /// Deliver a control message, e.g. '{"type":"UPDATE_CACHE"}'
  Message { json: String },
  /// List cache stores and their entry counts
  Caches,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = shellcache::logging::init(
    args.debug,
    shellcache::logging::default_log_dir().as_deref(),
  )?;

  // Load configuration, command-line origin wins over file and environment
  let config = ProxyConfig::load(args.config.as_deref())?.with_origin_override(args.origin);

  let storage = match args.db.as_deref() {
    Some(path) => SqliteStorage::open_at(path)?,
    None => SqliteStorage::open()?,
  };
  let network = Arc::new(HttpNetwork::new(&config)?);
  let proxy = OfflineCacheProxy::new(config, Arc::new(storage), Arc::clone(&network))?;

  match args.command {
    Command::Install => {
      proxy.install().await?;
      println!("{}", proxy.lifecycle()?);
    }
    Command::Activate => {
      let deleted = proxy.activate().await?;
      info!(deleted = deleted.len(), "Activation complete");
      println!("{}", proxy.lifecycle()?);
    }
    Command::Fetch {
      target,
      method,
      navigate,
      accept,
    } => {
      let url = proxy.config().resolve(&target)?;
      let mut request = if navigate {
        Request::navigate(url)
      } else {
        Request::get(url)
      }
      .with_method(&method);
      if let Some(accept) = accept {
        request = request.with_header("Accept", &accept);
      }

      let (response, source) = match proxy.intercept(&request).await? {
        FetchOutcome::Respond(result) => (result.data, result.source.to_string()),
        FetchOutcome::Passthrough => (network.fetch(&request).await?, "passthrough".to_string()),
      };
      info!(
        status = response.status,
        source = %source,
        "{} {}",
        request.method,
        request.url
      );
      std::io::stdout()
        .write_all(&response.body)
        .map_err(|e| eyre!("Failed to write response body: {}", e))?;
    }
    Command::Message { json } => {
      let data: serde_json::Value =
        serde_json::from_str(&json).map_err(|e| eyre!("Invalid message JSON: {}", e))?;
      match proxy.handle_message(&data).await? {
        Some(message) => info!(?message, "Message handled"),
        None => info!("Message ignored"),
      }
      // Lifecycle signals belong to this process; the host acts on them now
      println!("{}", proxy.lifecycle()?);
    }
    Command::Caches => {
      let current = &proxy.config().cache_version_name;
      for name in proxy.storage().keys()? {
        let marker = if &name == current { "*" } else { " " };
        println!("{} {} ({} entries)", marker, name, proxy.storage().entry_count(&name)?);
      }
    }
  }

  Ok(())
}
