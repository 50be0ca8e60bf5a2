//! Wiring of the store, notifier and engines

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::budget::BudgetEngine;
use crate::clock::{Clock, FixedClock, SystemClock};
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::goals::GoalEngine;
use crate::ledger::Ledger;
use crate::loans::LoanLedger;
use crate::notify::Notifier;
use crate::recurring::Scheduler;

/// Entry point to the engine: one database, one notifier, one clock.
///
/// The budget and goal engines are subscribed to the notifier at construction,
/// so every ledger write made through [`Tally::ledger`], the scheduler or the
/// loan ledger keeps budgets and goals current.
#[derive(Clone)]
pub struct Tally {
    db: Database,
    clock: Arc<dyn Clock>,
    ledger: Ledger,
    budgets: BudgetEngine,
    goals: GoalEngine,
    scheduler: Scheduler,
    loans: LoanLedger,
}

impl Tally {
    /// Open the configured database with the system clock
    pub fn open(config: &Config) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let path = config.database_path.to_str().ok_or_else(|| {
            Error::Config(format!(
                "database path is not valid UTF-8: {}",
                config.database_path.display()
            ))
        })?;

        let db = Database::new(path)?;
        info!(path, "Opened database");
        Ok(Self::with_clock(db, Arc::new(SystemClock)))
    }

    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        let budgets = BudgetEngine::new(db.clone(), clock.clone());
        let goals = GoalEngine::new(db.clone(), clock.clone());

        let mut notifier = Notifier::new();
        notifier.subscribe(Arc::new(budgets.clone()));
        notifier.subscribe(Arc::new(goals.clone()));
        let notifier = Arc::new(notifier);

        let ledger = Ledger::new(db.clone(), notifier);
        let scheduler = Scheduler::new(db.clone(), ledger.clone(), clock.clone());
        let loans = LoanLedger::new(db.clone(), ledger.clone());

        Self {
            db,
            clock,
            ledger,
            budgets,
            goals,
            scheduler,
            loans,
        }
    }

    /// The same store with the clock pinned to `today`.
    ///
    /// Used to replay a tick for a given day: statuses derived by the returned
    /// engine (budget COMPLETED, goal FAILED) are judged against `today`
    /// rather than the wall clock.
    pub fn as_of(&self, today: NaiveDate) -> Self {
        Self::with_clock(self.db.clone(), Arc::new(FixedClock::new(today)))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn budgets(&self) -> &BudgetEngine {
        &self.budgets
    }

    pub fn goals(&self) -> &GoalEngine {
        &self.goals
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn loans(&self) -> &LoanLedger {
        &self.loans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: dir.path().join("nested").join("tally.db"),
            ..Config::default()
        };

        let tally = Tally::open(&config).unwrap();
        assert!(config.database_path.exists());
        assert!(tally.db().list_users().unwrap().is_empty());
    }

    #[test]
    fn test_as_of_pins_status_derivation() {
        use crate::models::{BudgetStatus, GoalStatus, NewBudget, NewGoal};
        use crate::test_utils::{date, money, Fixture};

        let f = Fixture::new("2024-03-10");
        f.tally
            .budgets()
            .create_budget(
                f.owner.id,
                NewBudget {
                    category_id: f.food.id,
                    amount: money("100"),
                    start_date: date("2024-03-01"),
                    end_date: date("2024-03-31"),
                },
            )
            .unwrap();
        f.tally
            .goals()
            .create_goal(
                f.owner.id,
                NewGoal {
                    name: "Bike".into(),
                    target_amount: money("400"),
                    deadline: date("2024-03-31"),
                },
            )
            .unwrap();

        let later = f.tally.as_of(date("2024-04-02"));
        assert_eq!(later.clock().today(), date("2024-04-02"));
        assert_eq!(f.tally.clock().today(), date("2024-03-10"));

        let budgets = later.budgets().recalculate_all(f.owner.id).unwrap();
        assert_eq!(budgets[0].status, BudgetStatus::Completed);
        let goals = later.goals().recalculate_all(f.owner.id).unwrap();
        assert_eq!(goals[0].status, GoalStatus::Failed);
    }
}
