//! The worker facade.
//!
//! Composes the injected store, fetcher, router and bus behind the
//! intercepted-fetch contract: every GET in scope goes through `handle` and
//! comes back as a response. Static assets live in the shell store, data
//! responses in the data store; those two names are the activation
//! allow-list.

use std::sync::Arc;

use color_eyre::Result;

use crate::config::Config;
use crate::events::{BusMessage, EventBus, InvalidationEvent};
use crate::http::{Fetcher, Request, Response};
use crate::lifecycle::{self, WorkerState};
use crate::store::CacheStore;
use crate::router::{Route, Router};
use crate::strategy;

/// Offline worker for the Finny client.
pub struct Worker<S: CacheStore, F: Fetcher> {
  store: Arc<S>,
  fetcher: Arc<F>,
  router: Router,
  config: Arc<Config>,
  bus: EventBus,
  state: WorkerState,
}

/// Store inventory for the `status` command.
#[derive(Debug)]
pub struct WorkerStatus {
  pub state: WorkerState,
  /// (store name, snapshot count), allow-listed stores first.
  pub stores: Vec<(String, usize)>,
  pub shell_entries: usize,
  pub shell_manifest_len: usize,
}

impl WorkerStatus {
  /// The shell is healthy when every manifest entry has a snapshot.
  pub fn shell_complete(&self) -> bool {
    self.shell_entries >= self.shell_manifest_len
  }
}

impl<S: CacheStore, F: Fetcher> Worker<S, F> {
  pub fn new(store: Arc<S>, fetcher: Arc<F>, config: Config) -> Self {
    let router = Router::new(&config);
    Self {
      store,
      fetcher,
      router,
      config: Arc::new(config),
      bus: EventBus::default(),
      state: WorkerState::Installing,
    }
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn bus(&self) -> &EventBus {
    &self.bus
  }

  /// Pre-cache the app shell. All-or-nothing; failure leaves the worker in
  /// `Installing`.
  pub async fn install(&mut self) -> Result<()> {
    lifecycle::install(self.store.as_ref(), self.fetcher.as_ref(), &self.config).await?;
    self.state = WorkerState::Waiting;
    Ok(())
  }

  /// Delete stale store generations and claim the open pages.
  pub fn activate(&mut self) -> Result<Vec<String>> {
    let deleted = lifecycle::activate(self.store.as_ref(), &self.config, &self.bus)?;
    self.state = WorkerState::Active;
    Ok(deleted)
  }

  /// The intercepted-fetch contract: classify and dispatch.
  pub async fn handle(&self, request: Request) -> Result<Response> {
    match self.router.classify(&request) {
      Route::Bypass => self.fetcher.fetch(request).await,
      Route::AppShell => {
        let entry = Request::navigate(self.config.shell_entry_url()?);
        strategy::app_shell(&self.store, &self.fetcher, &self.config.shell_store(), &entry).await
      }
      Route::CacheFirst => {
        strategy::cache_first(&self.store, &self.fetcher, &self.config.shell_store(), &request)
          .await
      }
      Route::NetworkFirstData => {
        strategy::network_first(
          &self.store,
          &self.fetcher,
          &self.config.data_store(),
          &request,
          true,
        )
        .await
      }
      Route::NetworkFirst => {
        strategy::network_first(
          &self.store,
          &self.fetcher,
          &self.config.data_store(),
          &request,
          false,
        )
        .await
      }
    }
  }

  /// Publish one mutation notification on behalf of a screen. Returns the
  /// number of subscribers that saw it.
  pub fn notify_mutation(&self, event: InvalidationEvent) -> usize {
    self.bus.publish(BusMessage::Invalidation(event))
  }

  /// Inventory of stores for the status command.
  pub fn status(&self) -> Result<WorkerStatus> {
    let mut stores = Vec::new();
    for name in self.store.store_names()? {
      let count = self.store.entry_count(&name)?;
      stores.push((name, count));
    }
    // Allow-listed stores first, then leftovers from older generations.
    let allowed = self.config.allowed_stores();
    stores.sort_by_key(|(name, _)| (!allowed.contains(name), name.clone()));

    Ok(WorkerStatus {
      state: self.state,
      shell_entries: self.store.entry_count(&self.config.shell_store())?,
      shell_manifest_len: self.config.cache.shell_manifest.len(),
      stores,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::test_config;
  use crate::events::InvalidationKind;
  use crate::http::testing::FakeFetcher;
  use crate::http::{Destination, Method};
  use crate::identity::RequestIdentity;
  use crate::store::MemoryStore;
  use url::Url;

  fn worker(fetcher: Arc<FakeFetcher>) -> Worker<MemoryStore, FakeFetcher> {
    Worker::new(Arc::new(MemoryStore::new()), fetcher, test_config())
  }

  fn script_shell(fetcher: &FakeFetcher) {
    fetcher.respond_ok(Method::Get, "https://finny.app/", b"<html>shell</html>");
    fetcher.respond_ok(Method::Get, "https://finny.app/index.html", b"<html></html>");
    fetcher.respond_ok(Method::Get, "https://finny.app/manifest.json", b"{}");
  }

  #[tokio::test]
  async fn install_then_activate_walks_the_lifecycle() {
    let fetcher = Arc::new(FakeFetcher::new());
    script_shell(&fetcher);
    let mut worker = worker(fetcher);

    assert_eq!(worker.state(), WorkerState::Installing);
    worker.install().await.unwrap();
    assert_eq!(worker.state(), WorkerState::Waiting);
    worker.activate().unwrap();
    assert_eq!(worker.state(), WorkerState::Active);

    let status = worker.status().unwrap();
    assert!(status.shell_complete());
    assert_eq!(status.stores[0], ("app-shell-v4".to_string(), 3));
  }

  #[tokio::test]
  async fn failed_install_stays_in_installing() {
    let fetcher = Arc::new(FakeFetcher::new());
    fetcher.respond_status(Method::Get, "https://finny.app/", 503);
    let mut worker = worker(fetcher);

    assert!(worker.install().await.is_err());
    assert_eq!(worker.state(), WorkerState::Installing);
  }

  #[tokio::test]
  async fn non_get_requests_never_touch_a_store() {
    let fetcher = Arc::new(FakeFetcher::new());
    fetcher.respond_status(Method::Post, "https://backend.finny.app/rest/v1/expenses", 201);
    let worker = worker(Arc::clone(&fetcher));

    let request = Request::post(Url::parse("https://backend.finny.app/rest/v1/expenses").unwrap());
    let response = worker.handle(request).await.unwrap();
    assert_eq!(response.status, 201);

    // The bypass leaves no store behind at all.
    assert!(worker.store.store_names().unwrap().is_empty());
  }

  #[tokio::test]
  async fn navigations_serve_the_cached_shell_for_any_path() {
    let fetcher = Arc::new(FakeFetcher::new());
    script_shell(&fetcher);
    let mut worker = worker(Arc::clone(&fetcher));
    worker.install().await.unwrap();

    // Deep link with nothing scripted for its own URL: still gets the shell.
    let request = Request::navigate(Url::parse("https://finny.app/goals/vacation").unwrap());
    let response = worker.handle(request).await.unwrap();
    assert_eq!(response.body, b"<html>shell</html>");
  }

  #[tokio::test]
  async fn data_requests_land_in_the_data_store() {
    let fetcher = Arc::new(FakeFetcher::new());
    let url = "https://backend.finny.app/rest/v1/expenses";
    fetcher.respond_ok(Method::Get, url, b"[]");
    let worker = worker(fetcher);

    worker.handle(Request::get(Url::parse(url).unwrap())).await.unwrap();

    let id = RequestIdentity::new(Method::Get, url);
    assert!(worker.store.lookup("data-cache-v4", &id).unwrap().is_some());
    assert!(worker.store.lookup("app-shell-v4", &id).unwrap().is_none());
  }

  #[tokio::test]
  async fn concurrent_cold_gets_end_with_one_snapshot() {
    let fetcher = Arc::new(FakeFetcher::new());
    let url = "https://finny.app/static/chart.js";
    fetcher.respond_ok(Method::Get, url, b"js");
    let worker = Arc::new(worker(fetcher));

    let request =
      Request::get(Url::parse(url).unwrap()).with_destination(Destination::Script);

    let a = tokio::spawn({
      let worker = Arc::clone(&worker);
      let request = request.clone();
      async move { worker.handle(request).await }
    });
    let b = tokio::spawn({
      let worker = Arc::clone(&worker);
      let request = request.clone();
      async move { worker.handle(request).await }
    });

    assert!(a.await.unwrap().is_ok());
    assert!(b.await.unwrap().is_ok());

    // Both may have written, but last write wins on a single entry.
    assert_eq!(worker.store.entry_count("app-shell-v4").unwrap(), 1);
  }

  #[tokio::test]
  async fn mutation_notifications_reach_subscribers() {
    let fetcher = Arc::new(FakeFetcher::new());
    let worker = worker(fetcher);
    let mut rx = worker.bus().subscribe();

    let delivered = worker.notify_mutation(
      InvalidationEvent::new(InvalidationKind::BudgetUpdated, "budget-form")
        .with_record(serde_json::json!({"id": 7})),
    );
    assert_eq!(delivered, 1);

    match rx.try_recv().unwrap() {
      BusMessage::Invalidation(e) => assert_eq!(e.kind.wire_name(), "budget-updated"),
      other => panic!("unexpected message: {:?}", other),
    }
  }
}
