//! Typed invalidation bus.
//!
//! Screens publish exactly one event per successful mutation and interested
//! screens re-fetch on receipt. This replaces the old convention of
//! re-broadcasting the same DOM event on a 0/100/500ms timer to paper over
//! read-replica races: one deterministic publish, delivered to every
//! subscriber alive at publish time. Events are transient and never
//! persisted.
//!
//! Sync completion messages from the background sync layer ride the same
//! bus, so a page subscribes once for both kinds of signal.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// What kind of record changed. Wire names match what the client's screens
/// already listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationKind {
  ExpensesUpdated,
  ExpenseAdded,
  ExpenseUpdated,
  ExpenseRefresh,
  ReceiptScanned,
  FinnyExpenseAdded,
  BudgetUpdated,
  BudgetRefresh,
  WalletUpdated,
  IncomeUpdated,
}

impl InvalidationKind {
  pub fn wire_name(&self) -> &'static str {
    match self {
      InvalidationKind::ExpensesUpdated => "expenses-updated",
      InvalidationKind::ExpenseAdded => "expense-added",
      InvalidationKind::ExpenseUpdated => "expense-updated",
      InvalidationKind::ExpenseRefresh => "expense-refresh",
      InvalidationKind::ReceiptScanned => "receipt-scanned",
      InvalidationKind::FinnyExpenseAdded => "finny-expense-added",
      InvalidationKind::BudgetUpdated => "budget-updated",
      InvalidationKind::BudgetRefresh => "budget-refresh",
      InvalidationKind::WalletUpdated => "wallet-updated",
      InvalidationKind::IncomeUpdated => "income-updated",
    }
  }

  pub fn from_wire_name(name: &str) -> Option<Self> {
    match name {
      "expenses-updated" => Some(InvalidationKind::ExpensesUpdated),
      "expense-added" => Some(InvalidationKind::ExpenseAdded),
      "expense-updated" => Some(InvalidationKind::ExpenseUpdated),
      "expense-refresh" => Some(InvalidationKind::ExpenseRefresh),
      "receipt-scanned" => Some(InvalidationKind::ReceiptScanned),
      "finny-expense-added" => Some(InvalidationKind::FinnyExpenseAdded),
      "budget-updated" => Some(InvalidationKind::BudgetUpdated),
      "budget-refresh" => Some(InvalidationKind::BudgetRefresh),
      "wallet-updated" => Some(InvalidationKind::WalletUpdated),
      "income-updated" => Some(InvalidationKind::IncomeUpdated),
      _ => None,
    }
  }
}

/// A single mutation notification.
#[derive(Debug, Clone)]
pub struct InvalidationEvent {
  pub kind: InvalidationKind,
  /// The mutated record, if the publisher has it.
  pub record: Option<serde_json::Value>,
  pub at: DateTime<Utc>,
  /// Which screen or flow produced the mutation.
  pub source: String,
}

impl InvalidationEvent {
  pub fn new(kind: InvalidationKind, source: impl Into<String>) -> Self {
    Self {
      kind,
      record: None,
      at: Utc::now(),
      source: source.into(),
    }
  }

  pub fn with_record(mut self, record: serde_json::Value) -> Self {
    self.record = Some(record);
    self
  }
}

/// Background sync completion, posted to every connected page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMessage {
  ExpensesSynced,
  BudgetsSynced,
}

impl SyncMessage {
  /// Message `type` field as pages expect it.
  pub fn wire_name(&self) -> &'static str {
    match self {
      SyncMessage::ExpensesSynced => "EXPENSES_SYNCED",
      SyncMessage::BudgetsSynced => "BUDGETS_SYNCED",
    }
  }
}

/// Everything that travels on the bus.
#[derive(Debug, Clone)]
pub enum BusMessage {
  Invalidation(InvalidationEvent),
  Sync(SyncMessage),
  /// A new worker generation finished activation and claimed all pages.
  WorkerActivated,
}

/// Broadcast bus connecting the worker and all open pages.
///
/// Cloning is cheap; all clones publish into the same channel. Subscribers
/// only see messages published after they subscribe, matching the
/// broadcast-and-forget contract.
#[derive(Clone)]
pub struct EventBus {
  tx: broadcast::Sender<BusMessage>,
}

impl EventBus {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
    self.tx.subscribe()
  }

  /// Publish once. Returns how many subscribers received the message; zero
  /// subscribers is not an error.
  pub fn publish(&self, message: BusMessage) -> usize {
    self.tx.send(message).unwrap_or(0)
  }
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new(64)
  }
}
