//! Background sync.
//!
//! The platform scheduler redelivers a named tag when connectivity returns;
//! this module maps each tag to one registered async action. Built-in tags
//! post to a fixed endpoint with no body and announce completion on the
//! bus. There is no retry loop here: retry and backoff belong to the
//! platform scheduler that delivered the tag.

use std::collections::HashMap;
use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use tracing::{info, warn};

use crate::config::Config;
use crate::events::{BusMessage, EventBus, SyncMessage};
use crate::http::{Fetcher, Request};

pub const SYNC_EXPENSES: &str = "sync-expenses";
pub const SYNC_BUDGETS: &str = "sync-budgets";

type Handler<F> = Box<dyn Fn(Arc<F>, EventBus) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Registry of sync tags to handlers. New sync types are additive:
/// register a tag, no dispatch code changes.
pub struct SyncRegistry<F: Fetcher> {
  fetcher: Arc<F>,
  bus: EventBus,
  handlers: HashMap<String, Handler<F>>,
}

impl<F: Fetcher> SyncRegistry<F> {
  /// Build a registry with the built-in expense and budget sync tags.
  pub fn new(fetcher: Arc<F>, bus: EventBus, config: &Config) -> Result<Self> {
    let mut registry = Self {
      fetcher,
      bus,
      handlers: HashMap::new(),
    };

    let origin = config.origin_url()?;

    let expenses_url = origin
      .join("/api/sync/expenses")
      .map_err(|e| eyre!("Invalid sync endpoint: {}", e))?;
    registry.register(SYNC_EXPENSES, move |fetcher, bus| {
      let url = expenses_url.clone();
      Box::pin(post_and_notify(fetcher, url, SyncMessage::ExpensesSynced, bus))
    });

    let budgets_url = origin
      .join("/api/sync/budgets")
      .map_err(|e| eyre!("Invalid sync endpoint: {}", e))?;
    registry.register(SYNC_BUDGETS, move |fetcher, bus| {
      let url = budgets_url.clone();
      Box::pin(post_and_notify(fetcher, url, SyncMessage::BudgetsSynced, bus))
    });

    Ok(registry)
  }

  /// Register (or replace) the handler for a tag.
  pub fn register<H>(&mut self, tag: &str, handler: H)
  where
    H: Fn(Arc<F>, EventBus) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
  {
    self.handlers.insert(tag.to_string(), Box::new(handler));
  }

  /// All registered tags.
  pub fn tags(&self) -> Vec<&str> {
    self.handlers.keys().map(|s| s.as_str()).collect()
  }

  /// Run the handler for a tag. Unknown tags are an error.
  pub async fn dispatch(&self, tag: &str) -> Result<()> {
    let handler = self
      .handlers
      .get(tag)
      .ok_or_else(|| eyre!("No sync handler registered for tag '{}'", tag))?;
    handler(Arc::clone(&self.fetcher), self.bus.clone()).await
  }

  /// Entry point for a platform-delivered sync event. Failures are logged
  /// and left to the platform's own redelivery.
  pub async fn handle_sync_event(&self, tag: &str) {
    match self.dispatch(tag).await {
      Ok(()) => info!(tag, "Sync task completed"),
      Err(e) => warn!(tag, "Sync task failed: {e}"),
    }
  }
}

/// POST to the endpoint with no body; on any 2xx, notify every connected
/// page exactly once.
async fn post_and_notify<F: Fetcher>(
  fetcher: Arc<F>,
  url: url::Url,
  message: SyncMessage,
  bus: EventBus,
) -> Result<()> {
  let response = fetcher.fetch(Request::post(url.clone())).await?;

  if !response.is_success() {
    return Err(eyre!(
      "Sync endpoint {} returned status {}",
      url,
      response.status
    ));
  }

  let delivered = bus.publish(BusMessage::Sync(message));
  info!(%url, wire = message.wire_name(), delivered, "Sync completed, pages notified");
  Ok(())
}
