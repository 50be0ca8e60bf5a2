//! Ledger transaction rows
//!
//! These are raw row operations. Validation and change notification live in
//! [`crate::ledger::Ledger`]; nothing outside it should write this table.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::{date_col, datetime_col, decimal_col, enum_col, Database};
use crate::error::Result;
use crate::models::{sum_money, Direction, NewTransaction, Transaction};

const TRANSACTION_COLUMNS: &str = "id, owner_id, category_id, payment_channel_id, amount, \
     description, date, direction, origin, created_at";

fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        category_id: row.get(2)?,
        payment_channel_id: row.get(3)?,
        amount: decimal_col(row, 4)?,
        description: row.get(5)?,
        date: date_col(row, 6)?,
        direction: enum_col(row, 7)?,
        origin: enum_col(row, 8)?,
        created_at: datetime_col(row, 9)?,
    })
}

/// Insert a validated transaction and return its id
pub fn insert_transaction(conn: &Connection, tx: &NewTransaction) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO transactions
            (owner_id, category_id, payment_channel_id, amount, description, date, direction, origin)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            tx.owner_id,
            tx.category_id,
            tx.payment_channel_id,
            tx.amount.to_string(),
            tx.description,
            tx.date.to_string(),
            tx.direction.as_str(),
            tx.origin.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_transaction(conn: &Connection, owner_id: i64, id: i64) -> Result<Option<Transaction>> {
    let tx = conn
        .query_row(
            &format!(
                "SELECT {} FROM transactions WHERE id = ? AND owner_id = ?",
                TRANSACTION_COLUMNS
            ),
            params![id, owner_id],
            row_to_transaction,
        )
        .optional()?;
    Ok(tx)
}

/// Overwrite the editable fields of an existing row
pub fn update_transaction(conn: &Connection, tx: &Transaction) -> Result<()> {
    conn.execute(
        r#"
        UPDATE transactions
        SET category_id = ?, amount = ?, date = ?, description = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND owner_id = ?
        "#,
        params![
            tx.category_id,
            tx.amount.to_string(),
            tx.date.to_string(),
            tx.description,
            tx.id,
            tx.owner_id,
        ],
    )?;
    Ok(())
}

pub fn delete_transaction(conn: &Connection, owner_id: i64, id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM transactions WHERE id = ? AND owner_id = ?",
        params![id, owner_id],
    )?;
    Ok(())
}

/// Total of the owner's expenses in `category_id` dated within `[start, end]`
pub fn sum_expenses(
    conn: &Connection,
    owner_id: i64,
    category_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Decimal> {
    let mut stmt = conn.prepare(
        r#"
        SELECT amount FROM transactions
        WHERE owner_id = ? AND category_id = ? AND direction = 'expense'
          AND date >= ? AND date <= ?
        "#,
    )?;

    let amounts = stmt
        .query_map(
            params![owner_id, category_id, start.to_string(), end.to_string()],
            |row| decimal_col(row, 0),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    sum_money(amounts)
}

/// Total of all the owner's entries in `direction` dated within `[start, end]`, any category
pub fn sum_by_direction(
    conn: &Connection,
    owner_id: i64,
    direction: Direction,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Decimal> {
    let mut stmt = conn.prepare(
        r#"
        SELECT amount FROM transactions
        WHERE owner_id = ? AND direction = ? AND date >= ? AND date <= ?
        "#,
    )?;

    let amounts = stmt
        .query_map(
            params![owner_id, direction.as_str(), start.to_string(), end.to_string()],
            |row| decimal_col(row, 0),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    sum_money(amounts)
}

/// List the owner's transactions, newest first, optionally bounded by date
pub fn list_transactions(
    conn: &Connection,
    owner_id: i64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {} FROM transactions
        WHERE owner_id = ?1
          AND (?2 IS NULL OR date >= ?2)
          AND (?3 IS NULL OR date <= ?3)
        ORDER BY date DESC, id DESC
        "#,
        TRANSACTION_COLUMNS
    ))?;

    let transactions = stmt
        .query_map(
            params![
                owner_id,
                from.map(|d| d.to_string()),
                to.map(|d| d.to_string())
            ],
            row_to_transaction,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(transactions)
}

impl Database {
    pub fn get_transaction(&self, owner_id: i64, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        get_transaction(&conn, owner_id, id)
    }

    pub fn list_transactions(
        &self,
        owner_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        list_transactions(&conn, owner_id, from, to)
    }
}
