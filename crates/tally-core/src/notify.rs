//! Change notifier
//!
//! Every ledger write publishes a [`TransactionChange`] to the registered
//! handlers before the write's SQL transaction commits. Handlers receive the
//! writer's connection, so whatever they do commits or rolls back together
//! with the triggering write.

use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::models::{ChangeKind, Direction, Transaction};

/// A ledger mutation as seen by subscribers
#[derive(Debug, Clone)]
pub struct TransactionChange {
    pub kind: ChangeKind,
    /// The row after the change (for DELETED, the row that was removed)
    pub transaction: Transaction,
    /// The row before the change; only set for UPDATED
    pub previous: Option<Transaction>,
}

impl TransactionChange {
    pub fn created(transaction: Transaction) -> Self {
        Self {
            kind: ChangeKind::Created,
            transaction,
            previous: None,
        }
    }

    pub fn updated(previous: Transaction, transaction: Transaction) -> Self {
        Self {
            kind: ChangeKind::Updated,
            transaction,
            previous: Some(previous),
        }
    }

    pub fn deleted(transaction: Transaction) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            transaction,
            previous: None,
        }
    }

    pub fn owner_id(&self) -> i64 {
        self.transaction.owner_id
    }

    /// Every (category, date) slot this change touched for the given direction.
    ///
    /// An update that moves an entry yields both the old and the new slot.
    pub fn positions(&self, direction: Direction) -> Vec<(i64, NaiveDate)> {
        let mut positions = Vec::with_capacity(2);
        for tx in std::iter::once(&self.transaction).chain(self.previous.as_ref()) {
            let slot = (tx.category_id, tx.date);
            if tx.direction == direction && !positions.contains(&slot) {
                positions.push(slot);
            }
        }
        positions
    }

    /// Every date this change touched, in either direction
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(2);
        for tx in std::iter::once(&self.transaction).chain(self.previous.as_ref()) {
            if !dates.contains(&tx.date) {
                dates.push(tx.date);
            }
        }
        dates
    }
}

/// Something that reacts to ledger changes inside the writer's transaction.
///
/// Returning an error aborts the triggering write.
pub trait ChangeHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_transaction_changed(&self, conn: &Connection, change: &TransactionChange) -> Result<()>;
}

/// Registry of change handlers, called synchronously in registration order
#[derive(Clone, Default)]
pub struct Notifier {
    handlers: Vec<Arc<dyn ChangeHandler>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, handler: Arc<dyn ChangeHandler>) {
        debug!(handler = handler.name(), "Registered change handler");
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Deliver `change` to every handler, stopping at the first failure
    pub fn publish(&self, conn: &Connection, change: &TransactionChange) -> Result<()> {
        debug!(
            kind = change.kind.as_str(),
            transaction_id = change.transaction.id,
            owner_id = change.owner_id(),
            "Publishing transaction change"
        );
        for handler in &self.handlers {
            handler.on_transaction_changed(conn, change)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.handlers.iter().map(|h| h.name()).collect();
        f.debug_struct("Notifier").field("handlers", &names).finish()
    }
}
