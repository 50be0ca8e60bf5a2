//! Budget recalculation engine
//!
//! A budget's spent amount is always re-derived from the ledger (sum of the
//! owner's expenses in the category within the window), never patched with a
//! delta. Recalculation therefore converges no matter how often it runs.

use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::db::{audit, budgets, categories, transactions, users, Database};
use crate::error::{Error, Result};
use crate::models::{Budget, BudgetStatus, BudgetUpdate, Direction, NewBudget};
use crate::notify::{ChangeHandler, TransactionChange};

/// Status of a budget given its totals, its end date and today
pub fn derive_status(
    amount: Decimal,
    spent: Decimal,
    end_date: NaiveDate,
    today: NaiveDate,
) -> BudgetStatus {
    if spent > amount {
        BudgetStatus::OverBudget
    } else if end_date < today {
        BudgetStatus::Completed
    } else {
        BudgetStatus::Active
    }
}

/// Recompute spent, remaining and status of `budget` from the ledger and store them
pub fn recalculate(conn: &Connection, budget: &Budget, today: NaiveDate) -> Result<Budget> {
    let spent = transactions::sum_expenses(
        conn,
        budget.owner_id,
        budget.category_id,
        budget.start_date,
        budget.end_date,
    )?;
    let remaining = budget.amount - spent;
    let status = derive_status(budget.amount, spent, budget.end_date, today);

    budgets::save_derived(conn, budget.id, spent, remaining, status)?;

    debug!(
        budget_id = budget.id,
        spent = %spent,
        remaining = %remaining,
        status = status.as_str(),
        "Recalculated budget"
    );

    Ok(Budget {
        spent_amount: spent,
        remaining_amount: remaining,
        status,
        ..budget.clone()
    })
}

#[derive(Clone)]
pub struct BudgetEngine {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl BudgetEngine {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Create a budget and compute it against the entries already in its window
    pub fn create_budget(&self, owner_id: i64, new: NewBudget) -> Result<Budget> {
        validate_bounds(new.amount, new.start_date, new.end_date)?;
        let today = self.clock.today();

        let budget = self.db.with_transaction(|conn| {
            check_budget_category(conn, owner_id, new.category_id)?;
            let id = budgets::insert_budget(conn, owner_id, &new)?;
            let budget = load(conn, owner_id, id)?;
            recalculate(conn, &budget, today)
        })?;

        info!(
            budget_id = budget.id,
            owner_id,
            category_id = budget.category_id,
            amount = %budget.amount,
            "Created budget"
        );
        Ok(budget)
    }

    /// Change a budget's bounds and recalculate it
    pub fn update_budget(&self, owner_id: i64, id: i64, update: BudgetUpdate) -> Result<Budget> {
        let today = self.clock.today();

        self.db.with_transaction(|conn| {
            let mut budget = load(conn, owner_id, id)?;
            if let Some(category_id) = update.category_id {
                if category_id != budget.category_id {
                    check_budget_category(conn, owner_id, category_id)?;
                }
                budget.category_id = category_id;
            }
            if let Some(amount) = update.amount {
                budget.amount = amount;
            }
            if let Some(start_date) = update.start_date {
                budget.start_date = start_date;
            }
            if let Some(end_date) = update.end_date {
                budget.end_date = end_date;
            }
            validate_bounds(budget.amount, budget.start_date, budget.end_date)?;

            budgets::update_budget_bounds(conn, &budget)?;
            let budget = recalculate(conn, &budget, today)?;
            info!(budget_id = id, owner_id, "Updated budget");
            Ok(budget)
        })
    }

    pub fn delete_budget(&self, owner_id: i64, id: i64) -> Result<()> {
        self.db.with_transaction(|conn| {
            let budget = load(conn, owner_id, id)?;
            let owner = users::require_user(conn, owner_id)?;
            budgets::delete_budget(conn, owner_id, id)?;

            let details = serde_json::json!({
                "category_id": budget.category_id,
                "amount": budget.amount.to_string(),
                "start_date": budget.start_date,
                "end_date": budget.end_date,
            })
            .to_string();
            audit::log_audit(
                conn,
                &owner.email,
                "budget.delete",
                Some("budget"),
                Some(id),
                Some(&details),
            )?;
            Ok(())
        })?;

        info!(budget_id = id, owner_id, "Deleted budget");
        Ok(())
    }

    pub fn get_budget(&self, owner_id: i64, id: i64) -> Result<Budget> {
        let conn = self.db.conn()?;
        load(&conn, owner_id, id)
    }

    pub fn list_budgets(&self, owner_id: i64) -> Result<Vec<Budget>> {
        self.db.list_budgets(owner_id)
    }

    /// Recalculate every budget of the owner, e.g. to mark finished windows COMPLETED
    pub fn recalculate_all(&self, owner_id: i64) -> Result<Vec<Budget>> {
        let today = self.clock.today();
        let refreshed = self.db.with_transaction(|conn| {
            users::require_user(conn, owner_id)?;
            budgets::list_budgets(conn, owner_id)?
                .iter()
                .map(|budget| recalculate(conn, budget, today))
                .collect::<Result<Vec<_>>>()
        })?;

        info!(owner_id, count = refreshed.len(), "Recalculated all budgets");
        Ok(refreshed)
    }
}

impl ChangeHandler for BudgetEngine {
    fn name(&self) -> &'static str {
        "budget-recalculation"
    }

    fn on_transaction_changed(&self, conn: &Connection, change: &TransactionChange) -> Result<()> {
        // Only expenses count toward budgets
        let positions = change.positions(Direction::Expense);
        if positions.is_empty() {
            return Ok(());
        }

        let owner_id = change.owner_id();
        if users::get_user(conn, owner_id)?.is_none() {
            return Err(Error::Configuration(format!(
                "owner {} of transaction {} does not exist",
                owner_id, change.transaction.id
            )));
        }

        let today = self.clock.today();
        let mut recalculated: Vec<i64> = Vec::new();
        for (category_id, date) in positions {
            if categories::get_category(conn, owner_id, category_id)?.is_none() {
                return Err(Error::Configuration(format!(
                    "category {} of transaction {} does not exist",
                    category_id, change.transaction.id
                )));
            }

            for budget in budgets::find_covering(conn, owner_id, category_id, date)? {
                if recalculated.contains(&budget.id) {
                    continue;
                }
                recalculate(conn, &budget, today)?;
                recalculated.push(budget.id);
            }
        }

        if !recalculated.is_empty() {
            debug!(
                kind = change.kind.as_str(),
                transaction_id = change.transaction.id,
                budgets = ?recalculated,
                "Budgets refreshed after ledger change"
            );
        }
        Ok(())
    }
}

fn load(conn: &Connection, owner_id: i64, id: i64) -> Result<Budget> {
    budgets::get_budget(conn, owner_id, id)?
        .ok_or_else(|| Error::not_found(format!("budget {} for owner {}", id, owner_id)))
}

fn validate_bounds(amount: Decimal, start: NaiveDate, end: NaiveDate) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "budget amount must be positive, got {}",
            amount
        )));
    }
    if start > end {
        return Err(Error::validation(format!(
            "budget window starts after it ends ({} > {})",
            start, end
        )));
    }
    Ok(())
}

fn check_budget_category(conn: &Connection, owner_id: i64, category_id: i64) -> Result<()> {
    let category = categories::require_category(conn, owner_id, category_id)?;
    if !category.active {
        return Err(Error::validation(format!(
            "category '{}' is inactive",
            category.name
        )));
    }
    if category.kind != Direction::Expense {
        return Err(Error::validation(format!(
            "category '{}' is not an expense category",
            category.name
        )));
    }
    if !category.budgetable {
        return Err(Error::validation(format!(
            "category '{}' cannot be budgeted",
            category.name
        )));
    }
    Ok(())
}
