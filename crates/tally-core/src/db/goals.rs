//! Savings goal rows

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::{date_col, decimal_col, enum_col, Database};
use crate::error::Result;
use crate::models::{Goal, GoalStatus, NewGoal};

const GOAL_COLUMNS: &str =
    "id, owner_id, name, target_amount, saved_amount, progress_percent, deadline, status";

fn row_to_goal(row: &Row) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        target_amount: decimal_col(row, 3)?,
        saved_amount: decimal_col(row, 4)?,
        progress_percent: decimal_col(row, 5)?,
        deadline: date_col(row, 6)?,
        status: enum_col(row, 7)?,
    })
}

/// Insert a goal with nothing saved; the caller recalculates it immediately
pub fn insert_goal(conn: &Connection, owner_id: i64, goal: &NewGoal) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO goals (owner_id, name, target_amount, deadline)
        VALUES (?, ?, ?, ?)
        "#,
        params![
            owner_id,
            goal.name,
            goal.target_amount.to_string(),
            goal.deadline.to_string(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_goal(conn: &Connection, owner_id: i64, id: i64) -> Result<Option<Goal>> {
    let goal = conn
        .query_row(
            &format!(
                "SELECT {} FROM goals WHERE id = ? AND owner_id = ?",
                GOAL_COLUMNS
            ),
            params![id, owner_id],
            row_to_goal,
        )
        .optional()?;
    Ok(goal)
}

/// Write user-edited terms (name, target, deadline)
pub fn update_goal_terms(conn: &Connection, goal: &Goal) -> Result<()> {
    conn.execute(
        r#"
        UPDATE goals
        SET name = ?, target_amount = ?, deadline = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
        params![
            goal.name,
            goal.target_amount.to_string(),
            goal.deadline.to_string(),
            goal.id,
        ],
    )?;
    Ok(())
}

/// Persist the derived fields of a recalculation
pub fn save_derived(
    conn: &Connection,
    id: i64,
    saved: Decimal,
    progress: Decimal,
    status: GoalStatus,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE goals
        SET saved_amount = ?, progress_percent = ?, status = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
        params![saved.to_string(), progress.to_string(), status.as_str(), id],
    )?;
    Ok(())
}

pub fn delete_goal(conn: &Connection, owner_id: i64, id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM goals WHERE id = ? AND owner_id = ?",
        params![id, owner_id],
    )?;
    Ok(())
}

/// Goals of `owner_id` whose deadline falls within `[start, end]`
pub fn find_with_deadline_between(
    conn: &Connection,
    owner_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Goal>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {} FROM goals
        WHERE owner_id = ? AND deadline >= ? AND deadline <= ?
        ORDER BY deadline, id
        "#,
        GOAL_COLUMNS
    ))?;

    let goals = stmt
        .query_map(
            params![owner_id, start.to_string(), end.to_string()],
            row_to_goal,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(goals)
}

/// All goals of the owner, nearest deadline first
pub fn list_goals(conn: &Connection, owner_id: i64) -> Result<Vec<Goal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM goals WHERE owner_id = ? ORDER BY deadline, id",
        GOAL_COLUMNS
    ))?;

    let goals = stmt
        .query_map(params![owner_id], row_to_goal)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(goals)
}

impl Database {
    pub fn list_goals(&self, owner_id: i64) -> Result<Vec<Goal>> {
        let conn = self.conn()?;
        list_goals(&conn, owner_id)
    }
}
