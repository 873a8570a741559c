mod config;
mod events;
mod http;
mod identity;
mod lifecycle;
mod router;
mod store;
mod strategy;
mod sync;
mod worker;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::http::HttpFetcher;
use crate::store::SqliteStore;
use crate::sync::SyncRegistry;
use crate::worker::Worker;

#[derive(Parser, Debug)]
#[command(name = "finsync")]
#[command(about = "Offline cache and background sync layer for the Finny client")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/finsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Pre-cache the app shell and activate the current cache generation
  Install,
  /// Delete stale cache generations and claim open pages
  Activate,
  /// Show cache stores, entry counts and shell health
  Status,
  /// Run a background sync task by tag (e.g. sync-expenses)
  Sync {
    /// Registered sync tag
    tag: String,
  },
}

fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("finsync")
    .join("logs");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let file_appender = tracing_appender::rolling::daily(log_dir, "finsync.log");
  let (writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::registry()
    .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false),
    )
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = init_tracing()?;

  let args = Args::parse();
  let config = config::Config::load(args.config.as_deref())?;

  let store = Arc::new(SqliteStore::open()?);
  let fetcher = Arc::new(HttpFetcher::new()?);
  let mut worker = Worker::new(Arc::clone(&store), Arc::clone(&fetcher), config.clone());

  match args.command {
    Command::Install => {
      worker.install().await?;
      // Skip the waiting phase: a fresh install takes over immediately.
      let deleted = worker.activate()?;
      println!(
        "Installed {} ({} shell entries)",
        config.shell_store(),
        config.cache.shell_manifest.len()
      );
      for name in deleted {
        println!("Removed stale store {name}");
      }
    }
    Command::Activate => {
      let deleted = worker.activate()?;
      if deleted.is_empty() {
        println!("Nothing to clean up");
      } else {
        for name in deleted {
          println!("Removed stale store {name}");
        }
      }
    }
    Command::Status => {
      let status = worker.status()?;
      println!("State: {:?}", status.state);
      println!(
        "Shell: {}/{} entries {}",
        status.shell_entries,
        status.shell_manifest_len,
        if status.shell_complete() {
          "(complete)"
        } else {
          "(incomplete - run install)"
        }
      );
      for (name, count) in &status.stores {
        println!("  {name}: {count} snapshots");
      }
    }
    Command::Sync { tag } => {
      let registry = SyncRegistry::new(fetcher, worker.bus().clone(), &config)?;
      registry.dispatch(&tag).await?;
      println!("Sync task '{tag}' completed");
    }
  }

  Ok(())
}
