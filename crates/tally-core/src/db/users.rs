//! User operations and provisioning of per-owner system records

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::{datetime_col, Database};
use crate::error::{Error, Result};
use crate::models::{system, Direction, User};

/// System categories every owner gets: (name, kind, budgetable)
const SYSTEM_CATEGORIES: &[(&str, Direction, bool)] = &[
    (system::RECURRING_CATEGORY, Direction::Expense, true),
    (system::LOAN_PAYMENTS_CATEGORY, Direction::Expense, true),
    (system::LOAN_REPAYMENTS_CATEGORY, Direction::Income, false),
];

const SYSTEM_CHANNELS: &[&str] = &[system::CASH_CHANNEL, system::AUTO_PAY_CHANNEL];

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        created_at: datetime_col(row, 3)?,
    })
}

/// Create the fixed categories and channels the automated subsystems rely on.
///
/// Existing rows are left alone, so this can be re-run to repair an account.
pub fn provision_system_records(conn: &Connection, owner_id: i64) -> Result<()> {
    for (name, kind, budgetable) in SYSTEM_CATEGORIES {
        conn.execute(
            r#"
            INSERT INTO categories (owner_id, name, kind, budgetable, system_generated)
            VALUES (?, ?, ?, ?, 1)
            ON CONFLICT(owner_id, name) DO NOTHING
            "#,
            params![owner_id, name, kind.as_str(), budgetable],
        )?;
    }

    for name in SYSTEM_CHANNELS {
        conn.execute(
            r#"
            INSERT INTO payment_channels (owner_id, name, system_generated)
            VALUES (?, ?, 1)
            ON CONFLICT(owner_id, name) DO NOTHING
            "#,
            params![owner_id, name],
        )?;
    }

    Ok(())
}

pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, email, display_name, created_at FROM users WHERE id = ?",
            params![id],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

/// Fail with NotFound unless the owner exists
pub fn require_user(conn: &Connection, id: i64) -> Result<User> {
    get_user(conn, id)?.ok_or_else(|| Error::not_found(format!("user {}", id)))
}

impl Database {
    /// Create an owner together with their system categories and channels
    pub fn create_user(&self, email: &str, display_name: Option<&str>) -> Result<User> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::validation(format!("invalid email address: '{}'", email)));
        }

        let user = self.with_transaction(|conn| {
            let taken: Option<i64> = conn
                .query_row(
                    "SELECT id FROM users WHERE email = ?",
                    params![email],
                    |row| row.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Err(Error::validation(format!("user {} already exists", email)));
            }

            conn.execute(
                "INSERT INTO users (email, display_name) VALUES (?, ?)",
                params![email, display_name],
            )?;
            let id = conn.last_insert_rowid();
            provision_system_records(conn, id)?;
            require_user(conn, id)
        })?;

        info!(user_id = user.id, email = %user.email, "Created user");
        Ok(user)
    }

    /// Re-create any missing system records for an existing owner
    pub fn provision_system_records(&self, owner_id: i64) -> Result<()> {
        self.with_transaction(|conn| {
            require_user(conn, owner_id)?;
            provision_system_records(conn, owner_id)
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        get_user(&conn, id)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, email, display_name, created_at FROM users WHERE email = ?",
                params![email.trim()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, email, display_name, created_at FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }
}
