//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init, users, categories, channels, audit and shared utilities (open_tally, resolve_owner)
//! - `transactions` - Ledger commands (list, add, edit, delete)
//! - `budgets` - Budget commands (list, add, edit, delete, refresh)
//! - `goals` - Savings goal commands
//! - `recurring` - Recurring payment commands and the one-shot tick
//! - `loans` - Loan and installment commands
//! - `run` - Foreground daily scheduler

pub mod budgets;
pub mod core;
pub mod goals;
pub mod loans;
pub mod recurring;
pub mod run;
pub mod transactions;

// Re-export command functions for main.rs
pub use budgets::*;
pub use core::*;
pub use goals::*;
pub use loans::*;
pub use recurring::*;
pub use run::*;
pub use transactions::*;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use tally_core::models::Direction;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Colored amount: red for expenses, green for income
pub fn format_amount(amount: Decimal, direction: Direction) -> String {
    match direction {
        Direction::Expense => format!("\x1b[31m${:.2}\x1b[0m", amount),
        Direction::Income => format!("\x1b[32m+${:.2}\x1b[0m", amount),
    }
}

/// Pretty-print any serializable value as JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
