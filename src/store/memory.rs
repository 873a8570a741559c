//! In-memory store backend.
//!
//! Used by tests and by the cache-disabled mode. Same contract as the
//! persistent backend, nothing survives the process.

use std::collections::HashMap;
use std::sync::Mutex;

use color_eyre::{eyre::eyre, Result};

use super::CacheStore;
use crate::http::Snapshot;
use crate::identity::RequestIdentity;

#[derive(Default)]
pub struct MemoryStore {
  stores: Mutex<HashMap<String, HashMap<String, Snapshot>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStore for MemoryStore {
  fn open(&self, store: &str) -> Result<()> {
    let mut stores = self.stores.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    stores.entry(store.to_string()).or_default();
    Ok(())
  }

  fn lookup(&self, store: &str, identity: &RequestIdentity) -> Result<Option<Snapshot>> {
    let stores = self.stores.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      stores
        .get(store)
        .and_then(|entries| entries.get(&identity.key()))
        .cloned(),
    )
  }

  fn put(&self, store: &str, identity: &RequestIdentity, snapshot: &Snapshot) -> Result<()> {
    let mut stores = self.stores.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    stores
      .entry(store.to_string())
      .or_default()
      .insert(identity.key(), snapshot.clone());
    Ok(())
  }

  fn store_names(&self) -> Result<Vec<String>> {
    let stores = self.stores.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(stores.keys().cloned().collect())
  }

  fn delete_entry(&self, store: &str, identity: &RequestIdentity) -> Result<bool> {
    let mut stores = self.stores.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      stores
        .get_mut(store)
        .and_then(|entries| entries.remove(&identity.key()))
        .is_some(),
    )
  }

  fn delete_store(&self, store: &str) -> Result<bool> {
    let mut stores = self.stores.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(stores.remove(store).is_some())
  }

  fn entry_count(&self, store: &str) -> Result<usize> {
    let stores = self.stores.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(stores.get(store).map(|entries| entries.len()).unwrap_or(0))
  }
}
