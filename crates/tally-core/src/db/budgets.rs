//! Budget rows

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::{date_col, decimal_col, enum_col, Database};
use crate::error::Result;
use crate::models::{Budget, BudgetStatus, NewBudget};

const BUDGET_COLUMNS: &str = "id, owner_id, category_id, amount, spent_amount, remaining_amount, \
     start_date, end_date, status";

fn row_to_budget(row: &Row) -> rusqlite::Result<Budget> {
    Ok(Budget {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        category_id: row.get(2)?,
        amount: decimal_col(row, 3)?,
        spent_amount: decimal_col(row, 4)?,
        remaining_amount: decimal_col(row, 5)?,
        start_date: date_col(row, 6)?,
        end_date: date_col(row, 7)?,
        status: enum_col(row, 8)?,
    })
}

/// Insert a budget with nothing spent yet; the caller recalculates it immediately
pub fn insert_budget(conn: &Connection, owner_id: i64, budget: &NewBudget) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO budgets
            (owner_id, category_id, amount, spent_amount, remaining_amount, start_date, end_date, status)
        VALUES (?, ?, ?, '0', ?, ?, ?, 'active')
        "#,
        params![
            owner_id,
            budget.category_id,
            budget.amount.to_string(),
            budget.amount.to_string(),
            budget.start_date.to_string(),
            budget.end_date.to_string(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_budget(conn: &Connection, owner_id: i64, id: i64) -> Result<Option<Budget>> {
    let budget = conn
        .query_row(
            &format!(
                "SELECT {} FROM budgets WHERE id = ? AND owner_id = ?",
                BUDGET_COLUMNS
            ),
            params![id, owner_id],
            row_to_budget,
        )
        .optional()?;
    Ok(budget)
}

/// Write user-edited bounds (category, target, window)
pub fn update_budget_bounds(conn: &Connection, budget: &Budget) -> Result<()> {
    conn.execute(
        r#"
        UPDATE budgets
        SET category_id = ?, amount = ?, start_date = ?, end_date = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
        params![
            budget.category_id,
            budget.amount.to_string(),
            budget.start_date.to_string(),
            budget.end_date.to_string(),
            budget.id,
        ],
    )?;
    Ok(())
}

/// Persist the derived fields of a recalculation
pub fn save_derived(
    conn: &Connection,
    id: i64,
    spent: Decimal,
    remaining: Decimal,
    status: BudgetStatus,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE budgets
        SET spent_amount = ?, remaining_amount = ?, status = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
        params![spent.to_string(), remaining.to_string(), status.as_str(), id],
    )?;
    Ok(())
}

pub fn delete_budget(conn: &Connection, owner_id: i64, id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM budgets WHERE id = ? AND owner_id = ?",
        params![id, owner_id],
    )?;
    Ok(())
}

/// Budgets of `owner_id` on `category_id` whose window contains `date`
pub fn find_covering(
    conn: &Connection,
    owner_id: i64,
    category_id: i64,
    date: NaiveDate,
) -> Result<Vec<Budget>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {} FROM budgets
        WHERE owner_id = ?1 AND category_id = ?2 AND start_date <= ?3 AND end_date >= ?3
        ORDER BY id
        "#,
        BUDGET_COLUMNS
    ))?;

    let budgets = stmt
        .query_map(params![owner_id, category_id, date.to_string()], row_to_budget)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(budgets)
}

pub fn list_budgets(conn: &Connection, owner_id: i64) -> Result<Vec<Budget>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM budgets WHERE owner_id = ? ORDER BY start_date, id",
        BUDGET_COLUMNS
    ))?;

    let budgets = stmt
        .query_map(params![owner_id], row_to_budget)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(budgets)
}

impl Database {
    pub fn get_budget(&self, owner_id: i64, id: i64) -> Result<Option<Budget>> {
        let conn = self.conn()?;
        get_budget(&conn, owner_id, id)
    }

    pub fn list_budgets(&self, owner_id: i64) -> Result<Vec<Budget>> {
        let conn = self.conn()?;
        list_budgets(&conn, owner_id)
    }
}
