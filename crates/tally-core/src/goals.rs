//! Savings goal tracker
//!
//! A goal's saved amount is the owner's net income (all income minus all
//! expenses, any category) over the calendar month of its deadline, floored at
//! zero. Like budgets it is re-derived from the ledger on every relevant
//! change rather than adjusted by deltas.

use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::db::{audit, goals, transactions, users, Database};
use crate::error::{Error, Result};
use crate::models::{month_bounds, Direction, Goal, GoalStatus, GoalUpdate, NewGoal};
use crate::notify::{ChangeHandler, TransactionChange};

/// `saved / target` as a percentage, two decimals, clamped to 0..=100
pub fn progress_percent(saved: Decimal, target: Decimal) -> Decimal {
    let hundred = Decimal::ONE_HUNDRED;
    if target <= Decimal::ZERO || saved <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if saved >= target {
        return hundred;
    }
    (saved / target * hundred).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Status of a goal given what was saved, its deadline and today
pub fn derive_status(
    saved: Decimal,
    target: Decimal,
    deadline: NaiveDate,
    today: NaiveDate,
) -> GoalStatus {
    if saved >= target {
        GoalStatus::Completed
    } else if deadline < today {
        GoalStatus::Failed
    } else {
        GoalStatus::Active
    }
}

/// Recompute saved amount, progress and status of `goal` from the ledger and store them
pub fn recalculate(conn: &Connection, goal: &Goal, today: NaiveDate) -> Result<Goal> {
    let (start, end) = goal.window()?;
    let income = transactions::sum_by_direction(conn, goal.owner_id, Direction::Income, start, end)?;
    let expenses =
        transactions::sum_by_direction(conn, goal.owner_id, Direction::Expense, start, end)?;

    let saved = if income > expenses {
        income - expenses
    } else {
        Decimal::ZERO
    };
    let progress = progress_percent(saved, goal.target_amount);
    let status = derive_status(saved, goal.target_amount, goal.deadline, today);

    goals::save_derived(conn, goal.id, saved, progress, status)?;

    debug!(
        goal_id = goal.id,
        saved = %saved,
        progress = %progress,
        status = status.as_str(),
        "Recalculated goal"
    );

    Ok(Goal {
        saved_amount: saved,
        progress_percent: progress,
        status,
        ..goal.clone()
    })
}

#[derive(Clone)]
pub struct GoalEngine {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl GoalEngine {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn create_goal(&self, owner_id: i64, new: NewGoal) -> Result<Goal> {
        let name = validate_name(&new.name)?;
        validate_target(new.target_amount)?;
        let new = NewGoal { name, ..new };
        let today = self.clock.today();

        let goal = self.db.with_transaction(|conn| {
            users::require_user(conn, owner_id)?;
            let id = goals::insert_goal(conn, owner_id, &new)?;
            let goal = load(conn, owner_id, id)?;
            recalculate(conn, &goal, today)
        })?;

        info!(
            goal_id = goal.id,
            owner_id,
            target = %goal.target_amount,
            deadline = %goal.deadline,
            "Created goal"
        );
        Ok(goal)
    }

    /// Change a goal's terms and recalculate it
    pub fn update_goal(&self, owner_id: i64, id: i64, update: GoalUpdate) -> Result<Goal> {
        let today = self.clock.today();

        self.db.with_transaction(|conn| {
            let mut goal = load(conn, owner_id, id)?;
            if let Some(name) = update.name {
                goal.name = validate_name(&name)?;
            }
            if let Some(target) = update.target_amount {
                validate_target(target)?;
                goal.target_amount = target;
            }
            if let Some(deadline) = update.deadline {
                goal.deadline = deadline;
            }

            goals::update_goal_terms(conn, &goal)?;
            let goal = recalculate(conn, &goal, today)?;
            info!(goal_id = id, owner_id, "Updated goal");
            Ok(goal)
        })
    }

    pub fn delete_goal(&self, owner_id: i64, id: i64) -> Result<()> {
        self.db.with_transaction(|conn| {
            let goal = load(conn, owner_id, id)?;
            let owner = users::require_user(conn, owner_id)?;
            goals::delete_goal(conn, owner_id, id)?;

            let details = serde_json::json!({
                "name": goal.name,
                "target_amount": goal.target_amount.to_string(),
                "deadline": goal.deadline,
            })
            .to_string();
            audit::log_audit(
                conn,
                &owner.email,
                "goal.delete",
                Some("goal"),
                Some(id),
                Some(&details),
            )
        })?;

        info!(goal_id = id, owner_id, "Deleted goal");
        Ok(())
    }

    /// A goal, recalculated as of today
    pub fn get_goal(&self, owner_id: i64, id: i64) -> Result<Goal> {
        let today = self.clock.today();
        self.db.with_transaction(|conn| {
            let goal = load(conn, owner_id, id)?;
            recalculate(conn, &goal, today)
        })
    }

    pub fn list_goals(&self, owner_id: i64) -> Result<Vec<Goal>> {
        self.db.list_goals(owner_id)
    }

    /// Recalculate every goal of the owner, e.g. to mark passed deadlines FAILED
    pub fn recalculate_all(&self, owner_id: i64) -> Result<Vec<Goal>> {
        let today = self.clock.today();
        let refreshed = self.db.with_transaction(|conn| {
            users::require_user(conn, owner_id)?;
            goals::list_goals(conn, owner_id)?
                .iter()
                .map(|goal| recalculate(conn, goal, today))
                .collect::<Result<Vec<_>>>()
        })?;

        info!(owner_id, count = refreshed.len(), "Recalculated all goals");
        Ok(refreshed)
    }
}

impl ChangeHandler for GoalEngine {
    fn name(&self) -> &'static str {
        "goal-recalculation"
    }

    fn on_transaction_changed(&self, conn: &Connection, change: &TransactionChange) -> Result<()> {
        let owner_id = change.owner_id();
        let today = self.clock.today();

        // Both income and expenses move a goal, so every touched month counts
        let mut recalculated: Vec<i64> = Vec::new();
        for date in change.dates() {
            let (start, end) = month_bounds(date)?;
            for goal in goals::find_with_deadline_between(conn, owner_id, start, end)? {
                if recalculated.contains(&goal.id) {
                    continue;
                }
                recalculate(conn, &goal, today)?;
                recalculated.push(goal.id);
            }
        }

        if !recalculated.is_empty() {
            debug!(
                kind = change.kind.as_str(),
                transaction_id = change.transaction.id,
                goals = ?recalculated,
                "Goals refreshed after ledger change"
            );
        }
        Ok(())
    }
}

fn load(conn: &Connection, owner_id: i64, id: i64) -> Result<Goal> {
    goals::get_goal(conn, owner_id, id)?
        .ok_or_else(|| Error::not_found(format!("goal {} for owner {}", id, owner_id)))
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("goal name cannot be empty"));
    }
    Ok(name.to_string())
}

fn validate_target(target: Decimal) -> Result<()> {
    if target <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "goal target must be positive, got {}",
            target
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{system, NewTransaction, Origin, TransactionUpdate};
    use crate::test_utils::{date, money, Fixture};

    fn holiday(target: &str, deadline: &str) -> NewGoal {
        NewGoal {
            name: "Holiday".into(),
            target_amount: money(target),
            deadline: date(deadline),
        }
    }

    fn entry(f: &Fixture, amount: &str, day: &str, direction: Direction) -> NewTransaction {
        let category_id = match direction {
            Direction::Expense => f.food.id,
            Direction::Income => f
                .tally
                .db()
                .lookup_system_category(f.owner.id, system::LOAN_REPAYMENTS_CATEGORY)
                .unwrap()
                .id,
        };
        NewTransaction {
            owner_id: f.owner.id,
            category_id,
            payment_channel_id: None,
            amount: money(amount),
            description: None,
            date: date(day),
            direction,
            origin: Origin::Manual,
        }
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(money("250"), money("1000")), money("25.00"));
        assert_eq!(progress_percent(money("1"), money("3")), money("33.33"));
        assert_eq!(progress_percent(money("2"), money("3")), money("66.67"));
        assert_eq!(progress_percent(money("1500"), money("1000")), money("100"));
        assert_eq!(progress_percent(Decimal::ZERO, money("1000")), Decimal::ZERO);
    }

    #[test]
    fn test_derive_status() {
        let today = date("2024-03-15");
        assert_eq!(
            derive_status(money("100"), money("100"), date("2024-03-01"), today),
            GoalStatus::Completed
        );
        assert_eq!(
            derive_status(money("99"), money("100"), date("2024-03-14"), today),
            GoalStatus::Failed
        );
        // A deadline of today is still reachable
        assert_eq!(
            derive_status(money("99"), money("100"), today, today),
            GoalStatus::Active
        );
    }

    #[test]
    fn test_saved_is_net_income_of_deadline_month() {
        let f = Fixture::new("2024-03-10");
        let ledger = f.tally.ledger();
        ledger.create(entry(&f, "2000", "2024-03-01", Direction::Income)).unwrap();
        ledger.create(entry(&f, "1200", "2024-03-05", Direction::Expense)).unwrap();
        // Other months do not count
        ledger.create(entry(&f, "5000", "2024-02-28", Direction::Income)).unwrap();
        ledger.create(entry(&f, "300", "2024-04-01", Direction::Expense)).unwrap();

        let goal = f
            .tally
            .goals()
            .create_goal(f.owner.id, holiday("1000", "2024-03-31"))
            .unwrap();
        assert_eq!(goal.saved_amount, money("800"));
        assert_eq!(goal.progress_percent, money("80.00"));
        assert_eq!(goal.status, GoalStatus::Active);
    }

    #[test]
    fn test_ledger_changes_drive_recalculation() {
        let f = Fixture::new("2024-03-10");
        let goal = f
            .tally
            .goals()
            .create_goal(f.owner.id, holiday("500", "2024-03-20"))
            .unwrap();
        assert_eq!(goal.saved_amount, Decimal::ZERO);

        let pay = f
            .tally
            .ledger()
            .create(entry(&f, "600", "2024-03-02", Direction::Income))
            .unwrap();
        let g = f.tally.goals().list_goals(f.owner.id).unwrap().remove(0);
        assert_eq!(g.saved_amount, money("600"));
        assert_eq!(g.status, GoalStatus::Completed);
        assert_eq!(g.progress_percent, money("100"));

        // Spending pulls it back under target
        let spend = f
            .tally
            .ledger()
            .create(entry(&f, "250", "2024-03-03", Direction::Expense))
            .unwrap();
        let g = f.tally.goals().list_goals(f.owner.id).unwrap().remove(0);
        assert_eq!(g.saved_amount, money("350"));
        assert_eq!(g.status, GoalStatus::Active);

        // Moving the income out of the month refreshes the goal it left
        f.tally
            .ledger()
            .update(
                f.owner.id,
                pay.id,
                TransactionUpdate {
                    date: Some(date("2024-04-02")),
                    ..Default::default()
                },
            )
            .unwrap();
        let g = f.tally.goals().list_goals(f.owner.id).unwrap().remove(0);
        assert_eq!(g.saved_amount, Decimal::ZERO);
        assert_eq!(g.progress_percent, Decimal::ZERO);

        f.tally.ledger().delete(f.owner.id, spend.id).unwrap();
        let g = f.tally.goals().list_goals(f.owner.id).unwrap().remove(0);
        assert_eq!(g.saved_amount, Decimal::ZERO);
    }

    #[test]
    fn test_passed_deadline_fails_goal() {
        let f = Fixture::new("2024-03-10");
        let goal = f
            .tally
            .goals()
            .create_goal(f.owner.id, holiday("500", "2024-03-31"))
            .unwrap();
        assert_eq!(goal.status, GoalStatus::Active);

        f.clock.set(date("2024-04-01"));
        let refreshed = f.tally.goals().recalculate_all(f.owner.id).unwrap();
        assert_eq!(refreshed[0].status, GoalStatus::Failed);
        assert_eq!(
            f.tally.goals().get_goal(f.owner.id, goal.id).unwrap().status,
            GoalStatus::Failed
        );
    }

    #[test]
    fn test_update_moves_window() {
        let f = Fixture::new("2024-03-10");
        f.tally
            .ledger()
            .create(entry(&f, "900", "2024-05-10", Direction::Income))
            .unwrap();
        let goal = f
            .tally
            .goals()
            .create_goal(f.owner.id, holiday("1000", "2024-03-31"))
            .unwrap();
        assert_eq!(goal.saved_amount, Decimal::ZERO);

        let moved = f
            .tally
            .goals()
            .update_goal(
                f.owner.id,
                goal.id,
                GoalUpdate {
                    name: Some("  Summer trip ".into()),
                    target_amount: Some(money("900")),
                    deadline: Some(date("2024-05-31")),
                },
            )
            .unwrap();
        assert_eq!(moved.name, "Summer trip");
        assert_eq!(moved.saved_amount, money("900"));
        assert_eq!(moved.status, GoalStatus::Completed);
    }

    #[test]
    fn test_goal_validation_and_ownership() {
        let f = Fixture::new("2024-03-10");
        let goals = f.tally.goals();

        let mut nameless = holiday("100", "2024-03-31");
        nameless.name = "  ".into();
        assert_eq!(
            goals.create_goal(f.owner.id, nameless).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            goals
                .create_goal(f.owner.id, holiday("0", "2024-03-31"))
                .unwrap_err()
                .kind(),
            ErrorKind::Validation
        );

        let goal = goals
            .create_goal(f.owner.id, holiday("100", "2024-03-31"))
            .unwrap();
        let other = f.tally.db().create_user("bob@example.com", None).unwrap();
        assert_eq!(
            goals.get_goal(other.id, goal.id).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            goals.delete_goal(other.id, goal.id).unwrap_err().kind(),
            ErrorKind::NotFound
        );

        goals.delete_goal(f.owner.id, goal.id).unwrap();
        assert!(goals.list_goals(f.owner.id).unwrap().is_empty());
        let actions: Vec<String> = f
            .tally
            .db()
            .list_audit(10)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert!(actions.contains(&"goal.delete".to_string()));
    }

    #[test]
    fn test_list_orders_by_deadline() {
        let f = Fixture::new("2024-03-10");
        let goals = f.tally.goals();
        goals
            .create_goal(f.owner.id, holiday("100", "2024-12-31"))
            .unwrap();
        goals
            .create_goal(f.owner.id, holiday("100", "2024-06-30"))
            .unwrap();

        let deadlines: Vec<NaiveDate> = goals
            .list_goals(f.owner.id)
            .unwrap()
            .iter()
            .map(|g| g.deadline)
            .collect();
        assert_eq!(deadlines, vec![date("2024-06-30"), date("2024-12-31")]);
    }
}
