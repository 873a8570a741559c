//! Caching strategies.
//!
//! Two policies over an injected store and fetcher:
//! - cache-first-with-background-refresh for static assets: the cached copy
//!   is the latency path, the network only repairs staleness
//! - network-first-with-cache-fallback for data: freshness wins, the cache
//!   and then an offline placeholder keep data screens from crashing
//!
//! Every cache write here is best-effort: a full or broken store never
//! fails the request that produced the response.

use std::sync::Arc;

use color_eyre::{eyre::eyre, Report, Result};
use tracing::debug;

use crate::http::{Fetcher, Request, Response, Snapshot};
use crate::identity::RequestIdentity;
use crate::store::{lookup_best_effort, put_best_effort, CacheStore};

/// Cache-first with background refresh.
///
/// On a hit the snapshot is returned immediately and a refresh is spawned;
/// refresh failures are swallowed, staleness is the accepted cost of
/// offline-first. On a miss the foreground path awaits the network and
/// stores a snapshot on 200.
pub async fn cache_first<S, F>(
  store: &Arc<S>,
  fetcher: &Arc<F>,
  store_name: &str,
  request: &Request,
) -> Result<Response>
where
  S: CacheStore,
  F: Fetcher,
{
  let identity = RequestIdentity::from(request);

  if let Some(snapshot) = lookup_best_effort(store.as_ref(), store_name, &identity) {
    spawn_refresh(
      Arc::clone(store),
      Arc::clone(fetcher),
      store_name.to_string(),
      request.clone(),
    );
    return Ok(snapshot.into_response());
  }

  // Cold cache: the foreground path pays for the fetch.
  let response = fetcher.fetch(request.clone()).await?;
  if response.is_ok() {
    put_best_effort(store.as_ref(), store_name, &identity, &Snapshot::capture(&response));
  }
  Ok(response)
}

/// Refresh the snapshot behind an already-served hit. Two concurrent
/// refreshes of the same URL are fine: last write wins and snapshots are
/// fungible.
fn spawn_refresh<S, F>(store: Arc<S>, fetcher: Arc<F>, store_name: String, request: Request)
where
  S: CacheStore,
  F: Fetcher,
{
  tokio::spawn(async move {
    let identity = RequestIdentity::from(&request);
    match fetcher.fetch(request).await {
      Ok(response) if response.is_ok() => {
        put_best_effort(store.as_ref(), &store_name, &identity, &Snapshot::capture(&response));
      }
      Ok(response) => {
        debug!(url = %identity.url, status = response.status, "Background refresh skipped non-200");
      }
      Err(e) => {
        debug!(url = %identity.url, "Background refresh failed: {e}");
      }
    }
  });
}

/// Network-first with cache fallback.
///
/// Live 200s are stored and returned. On transport failure the cached
/// snapshot is served; failing that, data requests get the offline
/// placeholder and everything else re-raises the original error.
pub async fn network_first<S, F>(
  store: &Arc<S>,
  fetcher: &Arc<F>,
  store_name: &str,
  request: &Request,
  is_data_request: bool,
) -> Result<Response>
where
  S: CacheStore,
  F: Fetcher,
{
  let identity = RequestIdentity::from(request);

  match fetcher.fetch(request.clone()).await {
    Ok(response) => {
      if response.is_ok() {
        put_best_effort(store.as_ref(), store_name, &identity, &Snapshot::capture(&response));
      }
      Ok(response)
    }
    Err(network_error) => {
      if let Some(snapshot) = lookup_best_effort(store.as_ref(), store_name, &identity) {
        debug!(url = %identity.url, "Network failed, serving cached snapshot");
        return Ok(snapshot.into_response());
      }
      if is_data_request {
        debug!(url = %identity.url, "Network failed with cold cache, serving offline placeholder");
        return Ok(offline_placeholder(&network_error));
      }
      Err(network_error)
    }
  }
}

/// App-shell resolution for navigations.
///
/// Client-side routing means almost every path renders the same entry
/// document, so navigations resolve to the single cached shell snapshot. If
/// the shell was never installed, fall through to the network.
pub async fn app_shell<S, F>(
  store: &Arc<S>,
  fetcher: &Arc<F>,
  store_name: &str,
  shell_entry: &Request,
) -> Result<Response>
where
  S: CacheStore,
  F: Fetcher,
{
  let identity = RequestIdentity::from(shell_entry);

  if let Some(snapshot) = lookup_best_effort(store.as_ref(), store_name, &identity) {
    return Ok(snapshot.into_response());
  }

  let response = fetcher
    .fetch(shell_entry.clone())
    .await
    .map_err(|e| eyre!("App shell is not cached and unreachable: {e}"))?;
  if response.is_ok() {
    put_best_effort(store.as_ref(), store_name, &identity, &Snapshot::capture(&response));
  }
  Ok(response)
}

/// The fixed body data screens render as an empty offline state instead of
/// crashing on a network error.
pub fn offline_placeholder(error: &Report) -> Response {
  Response::json(
    200,
    &serde_json::json!({
      "offline": true,
      "data": [],
      "error": error.to_string(),
    }),
  )
}
