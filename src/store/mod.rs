//! Named cache stores of request-identity -> response snapshot.
//!
//! Stores are the only shared mutable resource in the layer. They are
//! append/overwrite-only and injected into strategies and the worker, so
//! tests can substitute an in-memory backend for the persistent one.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use color_eyre::Result;
use tracing::warn;

use crate::http::Snapshot;
use crate::identity::RequestIdentity;

/// A set of named stores, each holding at most one snapshot per identity.
pub trait CacheStore: Send + Sync + 'static {
  /// Open (create if absent) a store. Idempotent.
  fn open(&self, store: &str) -> Result<()>;

  /// Look up a snapshot by request identity.
  fn lookup(&self, store: &str, identity: &RequestIdentity) -> Result<Option<Snapshot>>;

  /// Insert or overwrite a snapshot. Last write wins.
  fn put(&self, store: &str, identity: &RequestIdentity, snapshot: &Snapshot) -> Result<()>;

  /// Names of all stores that currently exist.
  fn store_names(&self) -> Result<Vec<String>>;

  /// Remove a single snapshot. Returns whether it existed.
  fn delete_entry(&self, store: &str, identity: &RequestIdentity) -> Result<bool>;

  /// Delete a store and everything in it. Returns whether it existed.
  fn delete_store(&self, store: &str) -> Result<bool>;

  /// Number of snapshots held by a store.
  fn entry_count(&self, store: &str) -> Result<usize>;

  /// Delete every store whose name is not in the allow-list. Used only
  /// during activation. Returns the names that were deleted.
  fn delete_stores_not_in(&self, allow: &[String]) -> Result<Vec<String>> {
    let mut deleted = Vec::new();
    for name in self.store_names()? {
      if !allow.iter().any(|a| a == &name) {
        self.delete_store(&name)?;
        deleted.push(name);
      }
    }
    Ok(deleted)
  }
}

/// Best-effort write: a failed cache write must never fail the operation
/// that produced the response, so it is logged and swallowed here.
pub fn put_best_effort<S: CacheStore + ?Sized>(
  store: &S,
  name: &str,
  identity: &RequestIdentity,
  snapshot: &Snapshot,
) {
  if let Err(e) = store.put(name, identity, snapshot) {
    warn!(store = name, url = %identity.url, "Cache write failed: {e}");
  }
}

/// Best-effort read: a broken store degrades to a miss, never to a failed
/// request.
pub fn lookup_best_effort<S: CacheStore + ?Sized>(
  store: &S,
  name: &str,
  identity: &RequestIdentity,
) -> Option<Snapshot> {
  match store.lookup(name, identity) {
    Ok(snapshot) => snapshot,
    Err(e) => {
      warn!(store = name, url = %identity.url, "Cache read failed: {e}");
      None
    }
  }
}
