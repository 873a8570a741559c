//! Worker lifecycle: install and activate.
//!
//! Install pre-caches the app-shell manifest all-or-nothing: a shell the
//! client cannot fully boot from offline is worse than no shell, so any
//! non-200 fails the install and leaves nothing from that attempt behind.
//! Activation deletes every store generation not in the current allow-list
//! and claims the open pages.

use color_eyre::{eyre::eyre, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::events::{BusMessage, EventBus};
use crate::http::{Fetcher, Request, Snapshot};
use crate::identity::RequestIdentity;
use crate::store::CacheStore;

/// Lifecycle phase of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Installing,
  /// Installed, not yet governing pages. Skipped in practice: the CLI
  /// activates immediately after install.
  Waiting,
  Active,
}

/// Pre-cache the shell manifest into the current shell store.
///
/// All entries are fetched and staged first; the store is only written once
/// every entry came back 200. Install-time failures are the one place this
/// layer does not swallow errors.
pub async fn install<S, F>(store: &S, fetcher: &F, config: &Config) -> Result<()>
where
  S: CacheStore,
  F: Fetcher,
{
  let shell_store = config.shell_store();
  store.open(&shell_store)?;

  let mut staged: Vec<(RequestIdentity, Snapshot)> = Vec::new();
  for path in &config.cache.shell_manifest {
    let url = config.manifest_url(path)?;
    let request = Request::get(url.clone());
    let response = fetcher
      .fetch(request.clone())
      .await
      .map_err(|e| eyre!("Install failed: could not fetch shell entry {}: {}", url, e))?;

    if !response.is_ok() {
      return Err(eyre!(
        "Install failed: shell entry {} returned status {}",
        url,
        response.status
      ));
    }

    staged.push((RequestIdentity::from(&request), Snapshot::capture(&response)));
  }

  // Every entry fetched clean; commit the batch. Writes here are hard
  // failures: an incomplete shell must fail the install. If a write fails
  // partway through, the slots written by this attempt are put back the
  // way they were so the store is never half-committed.
  let mut previous: Vec<Option<Snapshot>> = Vec::with_capacity(staged.len());
  for (identity, _) in &staged {
    previous.push(store.lookup(&shell_store, identity)?);
  }

  for (index, (identity, snapshot)) in staged.iter().enumerate() {
    if let Err(e) = store.put(&shell_store, identity, snapshot) {
      roll_back(store, &shell_store, &staged[..index], &previous);
      return Err(eyre!(
        "Install failed: could not write shell entry {}: {}",
        identity.url,
        e
      ));
    }
  }

  info!(
    store = %shell_store,
    entries = staged.len(),
    "Installed app shell"
  );
  Ok(())
}

/// Undo the writes of a failed commit, restoring each slot's prior snapshot
/// or deleting the entry if the slot was empty. Best-effort: the install is
/// already failing, so rollback problems are only logged.
fn roll_back<S: CacheStore>(
  store: &S,
  name: &str,
  written: &[(RequestIdentity, Snapshot)],
  previous: &[Option<Snapshot>],
) {
  for ((identity, _), prior) in written.iter().zip(previous).rev() {
    let result = match prior {
      Some(snapshot) => store.put(name, identity, snapshot),
      None => store.delete_entry(name, identity).map(|_| ()),
    };
    if let Err(e) = result {
      warn!(store = name, url = %identity.url, "Rollback of shell entry failed: {e}");
    }
  }
}

/// Version-upgrade cleanup plus page takeover.
///
/// Deletes every store not in the allow-list, then announces the claim on
/// the bus so pages switch to the new generation without a reload. Returns
/// the names of deleted stores.
pub fn activate<S>(store: &S, config: &Config, bus: &EventBus) -> Result<Vec<String>>
where
  S: CacheStore,
{
  let allowed = config.allowed_stores();
  store.open(&config.data_store())?;
  let deleted = store.delete_stores_not_in(&allowed)?;

  if !deleted.is_empty() {
    info!(deleted = ?deleted, "Removed stale cache generations");
  }

  bus.publish(BusMessage::WorkerActivated);
  info!(allowed = ?allowed, "Worker activated and claimed pages");
  Ok(deleted)
}
