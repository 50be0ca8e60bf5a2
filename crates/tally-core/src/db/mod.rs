//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `users` - Owners and provisioning of their system records
//! - `categories` - Categories and payment channels
//! - `transactions` - Ledger transaction rows
//! - `budgets` - Budget rows and expense sums
//! - `goals` - Savings goal rows
//! - `recurring` - Recurring definitions and schedule claims
//! - `loans` - Loans and installments
//! - `audit` - Append-only audit log
//!
//! Row-level functions take a `&Connection` so a caller can compose several of
//! them inside one SQL transaction (see [`Database::with_transaction`]). The
//! `impl Database` read helpers borrow a pooled connection for one-off queries.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, TransactionBehavior};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::Result;

pub mod audit;
pub mod budgets;
pub mod categories;
pub mod goals;
pub mod loans;
pub mod recurring;
pub mod transactions;
pub mod users;

pub use audit::AuditEntry;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// How long a writer waits for the SQLite write lock before giving up
const BUSY_TIMEOUT_MS: u32 = 5_000;

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

/// Read a SQLite `CURRENT_TIMESTAMP` value ("YYYY-MM-DD HH:MM:SS", UTC)
pub(crate) fn datetime_col(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .map_err(|e| conversion_error(idx, e))
}

/// Read a decimal stored as TEXT
pub(crate) fn decimal_col(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = row.get(idx)?;
    s.parse::<Decimal>().map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_decimal_col(row: &Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| s.parse::<Decimal>().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Read a `YYYY-MM-DD` date
pub(crate) fn date_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_date_col(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Read one of the lowercase enum strings written by `as_str()`
pub(crate) fn enum_col<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let s: String = row.get(idx)?;
    s.parse::<T>().map_err(|e| conversion_error(idx, e))
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) the database at `path` and run migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS.into()))?;
            Ok(())
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a unique temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "tally_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().into_owned();

        // Remove any leftovers from an earlier run
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(format!("{}-wal", path));
        let _ = std::fs::remove_file(format!("{}-shm", path));

        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run `f` inside one SQL transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise. The transaction
    /// takes the write lock up front so concurrent units of work serialize
    /// instead of failing halfway through.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        debug!("Unit of work committed");
        Ok(value)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: readers don't block the single writer
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                display_name TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL REFERENCES users(id),
                name TEXT NOT NULL COLLATE NOCASE,
                kind TEXT NOT NULL,                        -- expense, income
                active BOOLEAN NOT NULL DEFAULT 1,
                budgetable BOOLEAN NOT NULL DEFAULT 1,
                system_generated BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(owner_id, name)
            );

            CREATE TABLE IF NOT EXISTS payment_channels (
                id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL REFERENCES users(id),
                name TEXT NOT NULL COLLATE NOCASE,
                active BOOLEAN NOT NULL DEFAULT 1,
                system_generated BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(owner_id, name)
            );

            -- Ledger transactions (amounts are positive decimal TEXT)
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL REFERENCES users(id),
                category_id INTEGER NOT NULL REFERENCES categories(id),
                payment_channel_id INTEGER REFERENCES payment_channels(id),
                amount TEXT NOT NULL,
                description TEXT,
                date DATE NOT NULL,
                direction TEXT NOT NULL,                   -- expense, income
                origin TEXT NOT NULL DEFAULT 'manual',     -- manual, recurring, loan_installment
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_owner_category_date
                ON transactions(owner_id, category_id, date);

            CREATE TABLE IF NOT EXISTS budgets (
                id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL REFERENCES users(id),
                category_id INTEGER NOT NULL REFERENCES categories(id),
                amount TEXT NOT NULL,
                spent_amount TEXT NOT NULL DEFAULT '0',
                remaining_amount TEXT NOT NULL,
                start_date DATE NOT NULL,
                end_date DATE NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',     -- active, over_budget, completed
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_budgets_owner_category ON budgets(owner_id, category_id);

            -- Savings goals; saved_amount and status are derived from the ledger
            CREATE TABLE IF NOT EXISTS goals (
                id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                target_amount TEXT NOT NULL,
                saved_amount TEXT NOT NULL DEFAULT '0',
                progress_percent TEXT NOT NULL DEFAULT '0',
                deadline DATE NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',     -- active, completed, failed
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_goals_owner_deadline ON goals(owner_id, deadline);

            CREATE TABLE IF NOT EXISTS recurring_definitions (
                id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL REFERENCES users(id),
                category_id INTEGER NOT NULL REFERENCES categories(id),
                title TEXT NOT NULL,
                amount TEXT NOT NULL,
                direction TEXT NOT NULL,
                frequency TEXT NOT NULL,                   -- daily, weekly, monthly, yearly
                next_run_date DATE NOT NULL,
                auto_pay BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_recurring_due ON recurring_definitions(auto_pay, next_run_date);
            CREATE INDEX IF NOT EXISTS idx_recurring_owner ON recurring_definitions(owner_id);

            CREATE TABLE IF NOT EXISTS loans (
                id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL REFERENCES users(id),
                counterparty TEXT NOT NULL,
                loan_type TEXT NOT NULL,                   -- taken, given
                original_amount TEXT NOT NULL,
                remaining_amount TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',     -- active, closed
                start_date DATE,
                due_date DATE,
                interest_rate TEXT,
                notes TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_loans_owner ON loans(owner_id);

            -- No cascade: a loan with payment history cannot be deleted
            CREATE TABLE IF NOT EXISTS loan_installments (
                id INTEGER PRIMARY KEY,
                loan_id INTEGER NOT NULL REFERENCES loans(id),
                amount_paid TEXT NOT NULL,
                payment_date DATE NOT NULL,
                payment_channel_id INTEGER REFERENCES payment_channels(id),
                auto_generated BOOLEAN NOT NULL DEFAULT 0,
                notes TEXT,
                ledger_transaction_id INTEGER REFERENCES transactions(id) ON DELETE SET NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_installments_loan ON loan_installments(loan_id);

            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                actor TEXT NOT NULL,                       -- owner email or "scheduler"
                action TEXT NOT NULL,
                entity_type TEXT,
                entity_id INTEGER,
                details TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
