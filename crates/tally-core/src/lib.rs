//! Tally Core Library
//!
//! Derived-state consistency and scheduling engine for the Tally personal
//! finance tracker:
//! - SQLite store with connection pooling and migrations
//! - Transaction ledger with synchronous change notification
//! - Budget and savings goal recalculation driven by ledger changes
//! - Recurring transaction scheduler with a daily tick
//! - Loan installment ledger with auto-close and reopen
//! - Layered configuration and a pluggable clock

pub mod budget;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod goals;
pub mod ledger;
pub mod loans;
pub mod models;
pub mod notify;
pub mod recurring;

/// Shared fixtures for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use budget::BudgetEngine;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use db::{AuditEntry, Database};
pub use engine::Tally;
pub use error::{Error, ErrorKind, Result};
pub use goals::GoalEngine;
pub use ledger::Ledger;
pub use loans::LoanLedger;
pub use notify::{ChangeHandler, Notifier, TransactionChange};
pub use recurring::{Scheduler, TickReport};
