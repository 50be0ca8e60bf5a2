//! Test utilities for tally-core
//!
//! Shared fixtures for unit and integration tests: a throwaway engine pinned
//! to a fixed date with one provisioned owner.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::clock::FixedClock;
use crate::db::Database;
use crate::models::{Category, Direction, User};
use crate::Tally;

/// Parse a `YYYY-MM-DD` literal
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Parse a decimal literal such as `"12.50"`
pub fn money(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// An engine over a fresh database with a single owner and a "Food" category
pub struct Fixture {
    pub tally: Tally,
    pub clock: Arc<FixedClock>,
    pub owner: User,
    pub food: Category,
}

impl Fixture {
    /// Build a fixture whose clock reads `today`
    pub fn new(today: &str) -> Self {
        let db = Database::in_memory().unwrap();
        let clock = Arc::new(FixedClock::new(date(today)));
        let tally = Tally::with_clock(db, clock.clone());
        let owner = tally
            .db()
            .create_user("owner@example.com", Some("Owner"))
            .unwrap();
        let food = tally
            .db()
            .create_category(owner.id, "Food", Direction::Expense, true)
            .unwrap();

        Self {
            tally,
            clock,
            owner,
            food,
        }
    }
}
