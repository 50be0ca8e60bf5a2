//! Recurring definition rows and schedule claims

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{date_col, decimal_col, enum_col, Database};
use crate::error::Result;
use crate::models::RecurringDefinition;

const DEFINITION_COLUMNS: &str =
    "id, owner_id, category_id, title, amount, direction, frequency, next_run_date, auto_pay";

fn row_to_definition(row: &Row) -> rusqlite::Result<RecurringDefinition> {
    Ok(RecurringDefinition {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        category_id: row.get(2)?,
        title: row.get(3)?,
        amount: decimal_col(row, 4)?,
        direction: enum_col(row, 5)?,
        frequency: enum_col(row, 6)?,
        next_run_date: date_col(row, 7)?,
        auto_pay: row.get(8)?,
    })
}

/// Insert a definition; `def.id` is ignored
pub fn insert_definition(conn: &Connection, def: &RecurringDefinition) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO recurring_definitions
            (owner_id, category_id, title, amount, direction, frequency, next_run_date, auto_pay)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            def.owner_id,
            def.category_id,
            def.title,
            def.amount.to_string(),
            def.direction.as_str(),
            def.frequency.as_str(),
            def.next_run_date.to_string(),
            def.auto_pay,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_definition(
    conn: &Connection,
    owner_id: i64,
    id: i64,
) -> Result<Option<RecurringDefinition>> {
    let def = conn
        .query_row(
            &format!(
                "SELECT {} FROM recurring_definitions WHERE id = ? AND owner_id = ?",
                DEFINITION_COLUMNS
            ),
            params![id, owner_id],
            row_to_definition,
        )
        .optional()?;
    Ok(def)
}

/// Get a definition without an owner scope (the tick works across owners)
pub fn get_definition_any_owner(conn: &Connection, id: i64) -> Result<Option<RecurringDefinition>> {
    let def = conn
        .query_row(
            &format!(
                "SELECT {} FROM recurring_definitions WHERE id = ?",
                DEFINITION_COLUMNS
            ),
            params![id],
            row_to_definition,
        )
        .optional()?;
    Ok(def)
}

pub fn update_definition(conn: &Connection, def: &RecurringDefinition) -> Result<()> {
    conn.execute(
        r#"
        UPDATE recurring_definitions
        SET title = ?, amount = ?, direction = ?, frequency = ?, next_run_date = ?, auto_pay = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND owner_id = ?
        "#,
        params![
            def.title,
            def.amount.to_string(),
            def.direction.as_str(),
            def.frequency.as_str(),
            def.next_run_date.to_string(),
            def.auto_pay,
            def.id,
            def.owner_id,
        ],
    )?;
    Ok(())
}

pub fn set_auto_pay(conn: &Connection, id: i64, auto_pay: bool) -> Result<()> {
    conn.execute(
        "UPDATE recurring_definitions SET auto_pay = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        params![auto_pay, id],
    )?;
    Ok(())
}

pub fn delete_definition(conn: &Connection, owner_id: i64, id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM recurring_definitions WHERE id = ? AND owner_id = ?",
        params![id, owner_id],
    )?;
    Ok(())
}

/// Ids of auto-pay definitions due on or before `today`, in id order
pub fn due_definition_ids(conn: &Connection, today: NaiveDate) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id FROM recurring_definitions
        WHERE auto_pay = 1 AND next_run_date <= ?
        ORDER BY id
        "#,
    )?;

    let ids = stmt
        .query_map(params![today.to_string()], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;

    Ok(ids)
}

/// Move `next_run_date` from `prior` to `next`.
///
/// Returns false when the row no longer has `prior` as its next run date,
/// meaning another writer already handled this occurrence.
pub fn claim_occurrence(
    conn: &Connection,
    id: i64,
    prior: NaiveDate,
    next: NaiveDate,
) -> Result<bool> {
    let changed = conn.execute(
        r#"
        UPDATE recurring_definitions
        SET next_run_date = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND next_run_date = ?
        "#,
        params![next.to_string(), id, prior.to_string()],
    )?;
    Ok(changed == 1)
}

pub fn list_definitions(conn: &Connection, owner_id: i64) -> Result<Vec<RecurringDefinition>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM recurring_definitions WHERE owner_id = ? ORDER BY next_run_date, id",
        DEFINITION_COLUMNS
    ))?;

    let defs = stmt
        .query_map(params![owner_id], row_to_definition)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(defs)
}

impl Database {
    pub fn get_definition(&self, owner_id: i64, id: i64) -> Result<Option<RecurringDefinition>> {
        let conn = self.conn()?;
        get_definition(&conn, owner_id, id)
    }

    pub fn list_definitions(&self, owner_id: i64) -> Result<Vec<RecurringDefinition>> {
        let conn = self.conn()?;
        list_definitions(&conn, owner_id)
    }
}
