//! Loan and installment rows

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{date_col, decimal_col, enum_col, opt_date_col, opt_decimal_col, Database};
use crate::error::Result;
use crate::models::{Installment, Loan, NewLoan, NewPayment};

const LOAN_COLUMNS: &str = "id, owner_id, counterparty, loan_type, original_amount, \
     remaining_amount, status, start_date, due_date, interest_rate, notes";

const INSTALLMENT_COLUMNS: &str = "id, loan_id, amount_paid, payment_date, payment_channel_id, \
     auto_generated, notes, ledger_transaction_id";

fn row_to_loan(row: &Row) -> rusqlite::Result<Loan> {
    Ok(Loan {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        counterparty: row.get(2)?,
        loan_type: enum_col(row, 3)?,
        original_amount: decimal_col(row, 4)?,
        remaining_amount: decimal_col(row, 5)?,
        status: enum_col(row, 6)?,
        start_date: opt_date_col(row, 7)?,
        due_date: opt_date_col(row, 8)?,
        interest_rate: opt_decimal_col(row, 9)?,
        notes: row.get(10)?,
    })
}

fn row_to_installment(row: &Row) -> rusqlite::Result<Installment> {
    Ok(Installment {
        id: row.get(0)?,
        loan_id: row.get(1)?,
        amount_paid: decimal_col(row, 2)?,
        payment_date: date_col(row, 3)?,
        payment_channel_id: row.get(4)?,
        auto_generated: row.get(5)?,
        notes: row.get(6)?,
        ledger_transaction_id: row.get(7)?,
    })
}

/// Insert an ACTIVE loan with nothing paid yet
pub fn insert_loan(conn: &Connection, owner_id: i64, loan: &NewLoan) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO loans
            (owner_id, counterparty, loan_type, original_amount, remaining_amount, status,
             start_date, due_date, interest_rate, notes)
        VALUES (?, ?, ?, ?, ?, 'active', ?, ?, ?, ?)
        "#,
        params![
            owner_id,
            loan.counterparty,
            loan.loan_type.as_str(),
            loan.original_amount.to_string(),
            loan.original_amount.to_string(),
            loan.start_date.map(|d| d.to_string()),
            loan.due_date.map(|d| d.to_string()),
            loan.interest_rate.map(|r| r.to_string()),
            loan.notes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_loan(conn: &Connection, owner_id: i64, id: i64) -> Result<Option<Loan>> {
    let loan = conn
        .query_row(
            &format!(
                "SELECT {} FROM loans WHERE id = ? AND owner_id = ?",
                LOAN_COLUMNS
            ),
            params![id, owner_id],
            row_to_loan,
        )
        .optional()?;
    Ok(loan)
}

/// Write every mutable loan field back
pub fn save_loan(conn: &Connection, loan: &Loan) -> Result<()> {
    conn.execute(
        r#"
        UPDATE loans
        SET counterparty = ?, original_amount = ?, remaining_amount = ?, status = ?,
            due_date = ?, interest_rate = ?, notes = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND owner_id = ?
        "#,
        params![
            loan.counterparty,
            loan.original_amount.to_string(),
            loan.remaining_amount.to_string(),
            loan.status.as_str(),
            loan.due_date.map(|d| d.to_string()),
            loan.interest_rate.map(|r| r.to_string()),
            loan.notes,
            loan.id,
            loan.owner_id,
        ],
    )?;
    Ok(())
}

pub fn delete_loan(conn: &Connection, owner_id: i64, id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM loans WHERE id = ? AND owner_id = ?",
        params![id, owner_id],
    )?;
    Ok(())
}

pub fn list_loans(conn: &Connection, owner_id: i64, include_closed: bool) -> Result<Vec<Loan>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {} FROM loans
        WHERE owner_id = ? AND (? OR status = 'active')
        ORDER BY id
        "#,
        LOAN_COLUMNS
    ))?;

    let loans = stmt
        .query_map(params![owner_id, include_closed], row_to_loan)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(loans)
}

pub fn insert_installment(
    conn: &Connection,
    loan_id: i64,
    payment: &NewPayment,
    payment_channel_id: Option<i64>,
    ledger_transaction_id: Option<i64>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO loan_installments
            (loan_id, amount_paid, payment_date, payment_channel_id, auto_generated, notes,
             ledger_transaction_id)
        VALUES (?, ?, ?, ?, 0, ?, ?)
        "#,
        params![
            loan_id,
            payment.amount.to_string(),
            payment.date.to_string(),
            payment_channel_id,
            payment.notes,
            ledger_transaction_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_installment(conn: &Connection, loan_id: i64, id: i64) -> Result<Option<Installment>> {
    let installment = conn
        .query_row(
            &format!(
                "SELECT {} FROM loan_installments WHERE id = ? AND loan_id = ?",
                INSTALLMENT_COLUMNS
            ),
            params![id, loan_id],
            row_to_installment,
        )
        .optional()?;
    Ok(installment)
}

pub fn delete_installment(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM loan_installments WHERE id = ?", params![id])?;
    Ok(())
}

pub fn list_installments(conn: &Connection, loan_id: i64) -> Result<Vec<Installment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM loan_installments WHERE loan_id = ? ORDER BY payment_date, id",
        INSTALLMENT_COLUMNS
    ))?;

    let installments = stmt
        .query_map(params![loan_id], row_to_installment)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(installments)
}

pub fn count_installments(conn: &Connection, loan_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM loan_installments WHERE loan_id = ?",
        params![loan_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

impl Database {
    pub fn get_loan(&self, owner_id: i64, id: i64) -> Result<Option<Loan>> {
        let conn = self.conn()?;
        get_loan(&conn, owner_id, id)
    }

    pub fn list_loans(&self, owner_id: i64, include_closed: bool) -> Result<Vec<Loan>> {
        let conn = self.conn()?;
        list_loans(&conn, owner_id, include_closed)
    }
}
