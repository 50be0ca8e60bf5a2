//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tally_core::models::{Direction, Frequency, LoanType};

/// Tally - Budgets, recurring payments and loans that keep themselves in sync
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Personal finance tracker with budgets, recurring payments and loans", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to <data dir>/tally/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path (overrides config and TALLY_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Act as this user (email). Optional when only one user exists.
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Manage users
    Users {
        #[command(subcommand)]
        action: Option<UsersAction>,
    },

    /// Manage categories
    Categories {
        #[command(subcommand)]
        action: Option<CategoriesAction>,
    },

    /// Manage payment channels
    Channels {
        #[command(subcommand)]
        action: Option<ChannelsAction>,
    },

    /// Manage ledger transactions (list, add, edit, delete)
    Transactions {
        #[command(subcommand)]
        action: Option<TransactionsAction>,
    },

    /// Manage budgets
    Budgets {
        #[command(subcommand)]
        action: Option<BudgetsAction>,
    },

    /// Manage savings goals
    Goals {
        #[command(subcommand)]
        action: Option<GoalsAction>,
    },

    /// Manage recurring payments
    Recurring {
        #[command(subcommand)]
        action: Option<RecurringAction>,
    },

    /// Manage loans and their installments
    Loans {
        #[command(subcommand)]
        action: Option<LoansAction>,
    },

    /// Run one scheduler tick now
    Tick {
        /// Treat this date as today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Run the daily scheduler loop in the foreground
    Run,

    /// Show the audit log
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum UsersAction {
    /// List users
    List,
    /// Create a user with their system categories and channels
    Add {
        /// Email address
        email: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
    /// Re-create missing system categories and channels
    Repair,
}

#[derive(Subcommand)]
pub enum CategoriesAction {
    /// List categories
    List,
    /// Add a category
    Add {
        /// Category name
        name: String,
        /// expense or income
        #[arg(short, long, default_value = "expense")]
        kind: Direction,
        /// Exclude the category from budgets
        #[arg(long)]
        not_budgetable: bool,
    },
    /// Deactivate a category
    Disable { id: i64 },
    /// Reactivate a category
    Enable { id: i64 },
}

#[derive(Subcommand)]
pub enum ChannelsAction {
    /// List payment channels
    List,
    /// Add a payment channel
    Add {
        /// Channel name (e.g. "Visa")
        name: String,
    },
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// List transactions
    List {
        /// Earliest date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Latest date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Record an expense or income
    Add {
        /// Amount (positive)
        amount: Decimal,
        /// Category id
        #[arg(short, long)]
        category: i64,
        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// expense or income
        #[arg(long, default_value = "expense")]
        direction: Direction,
        /// Payment channel id (expenses default to Cash)
        #[arg(long)]
        channel: Option<i64>,
        /// Free-text note
        #[arg(long)]
        description: Option<String>,
    },
    /// Edit a transaction
    Edit {
        id: i64,
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        category: Option<i64>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a transaction
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum BudgetsAction {
    /// List budgets
    List,
    /// Create a budget
    Add {
        /// Category id
        #[arg(short, long)]
        category: i64,
        /// Spending cap
        amount: Decimal,
        /// First day of the window (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last day of the window, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
    },
    /// Edit a budget's bounds
    Edit {
        id: i64,
        #[arg(long)]
        category: Option<i64>,
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Delete a budget
    Delete { id: i64 },
    /// Recalculate every budget
    Refresh,
}

#[derive(Subcommand)]
pub enum GoalsAction {
    /// List goals, nearest deadline first
    List,
    /// Create a goal measured against the net income of the deadline month
    Add {
        /// What you are saving for
        name: String,
        /// Target amount
        amount: Decimal,
        /// Deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: NaiveDate,
    },
    /// Edit a goal's terms
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        deadline: Option<NaiveDate>,
    },
    /// Delete a goal
    Delete { id: i64 },
    /// Recalculate every goal
    Refresh,
}

#[derive(Subcommand)]
pub enum RecurringAction {
    /// List recurring definitions
    List,
    /// Create a recurring definition
    Add {
        /// Title, used as the transaction description
        title: String,
        /// Amount (positive)
        amount: Decimal,
        /// daily, weekly, monthly or yearly
        #[arg(short, long, default_value = "monthly")]
        frequency: Frequency,
        /// First run date (YYYY-MM-DD); past dates move to tomorrow
        #[arg(long)]
        next: NaiveDate,
        /// expense or income
        #[arg(long, default_value = "expense")]
        direction: Direction,
        /// Create paused (no automatic firing)
        #[arg(long)]
        paused: bool,
    },
    /// Edit a recurring definition
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        frequency: Option<Frequency>,
        #[arg(long)]
        next: Option<NaiveDate>,
        #[arg(long)]
        direction: Option<Direction>,
    },
    /// Stop automatic firing
    Pause { id: i64 },
    /// Fire once now and re-enable automatic firing
    Resume { id: i64 },
    /// Fire once now regardless of auto-pay
    RunNow { id: i64 },
    /// Delete a recurring definition
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum LoansAction {
    /// List loans
    List {
        /// Include closed loans
        #[arg(long)]
        all: bool,
    },
    /// Record a new loan
    Add {
        /// Who the money was borrowed from or lent to
        counterparty: String,
        /// Principal
        amount: Decimal,
        /// taken (borrowed) or given (lent)
        #[arg(short = 't', long = "type", default_value = "taken")]
        loan_type: LoanType,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Annual interest rate in percent (informational)
        #[arg(long)]
        rate: Option<Decimal>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Edit a loan's terms
    Edit {
        id: i64,
        #[arg(long)]
        counterparty: Option<String>,
        /// New original amount; what was already paid is kept
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(long)]
        rate: Option<Decimal>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Record a payment against a loan
    Pay {
        id: i64,
        amount: Decimal,
        /// Payment date (YYYY-MM-DD, defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Payment channel id (defaults to Cash)
        #[arg(long)]
        channel: Option<i64>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List a loan's installments
    Installments { id: i64 },
    /// Reverse (delete) an installment
    Reverse {
        /// Loan id
        loan: i64,
        /// Installment id
        installment: i64,
    },
    /// Close a fully paid loan
    Close { id: i64 },
    /// Delete a loan without payments
    Delete { id: i64 },
    /// Totals across all loans
    Summary,
}
