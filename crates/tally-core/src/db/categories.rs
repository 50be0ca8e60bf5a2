//! Category and payment channel operations

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::{enum_col, Database};
use crate::error::{Error, Result};
use crate::models::{Category, Direction, PaymentChannel};

const CATEGORY_COLUMNS: &str =
    "id, owner_id, name, kind, active, budgetable, system_generated";

const CHANNEL_COLUMNS: &str = "id, owner_id, name, active, system_generated";

fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        kind: enum_col(row, 3)?,
        active: row.get(4)?,
        budgetable: row.get(5)?,
        system_generated: row.get(6)?,
    })
}

fn row_to_channel(row: &Row) -> rusqlite::Result<PaymentChannel> {
    Ok(PaymentChannel {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        active: row.get(3)?,
        system_generated: row.get(4)?,
    })
}

/// Get a category, scoped to its owner
pub fn get_category(conn: &Connection, owner_id: i64, id: i64) -> Result<Option<Category>> {
    let category = conn
        .query_row(
            &format!(
                "SELECT {} FROM categories WHERE id = ? AND owner_id = ?",
                CATEGORY_COLUMNS
            ),
            params![id, owner_id],
            row_to_category,
        )
        .optional()?;
    Ok(category)
}

pub fn require_category(conn: &Connection, owner_id: i64, id: i64) -> Result<Category> {
    get_category(conn, owner_id, id)?
        .ok_or_else(|| Error::not_found(format!("category {} for owner {}", id, owner_id)))
}

/// Find one of the owner's system categories by name.
///
/// A missing record means the account was never provisioned properly, which is
/// a configuration problem rather than bad input.
pub fn lookup_system_category(conn: &Connection, owner_id: i64, name: &str) -> Result<Category> {
    conn.query_row(
        &format!(
            "SELECT {} FROM categories WHERE owner_id = ? AND name = ? AND system_generated = 1",
            CATEGORY_COLUMNS
        ),
        params![owner_id, name],
        row_to_category,
    )
    .optional()?
    .ok_or_else(|| {
        Error::Configuration(format!(
            "system category '{}' is missing for owner {}",
            name, owner_id
        ))
    })
}

pub fn get_payment_channel(
    conn: &Connection,
    owner_id: i64,
    id: i64,
) -> Result<Option<PaymentChannel>> {
    let channel = conn
        .query_row(
            &format!(
                "SELECT {} FROM payment_channels WHERE id = ? AND owner_id = ?",
                CHANNEL_COLUMNS
            ),
            params![id, owner_id],
            row_to_channel,
        )
        .optional()?;
    Ok(channel)
}

pub fn require_payment_channel(conn: &Connection, owner_id: i64, id: i64) -> Result<PaymentChannel> {
    get_payment_channel(conn, owner_id, id)?
        .ok_or_else(|| Error::not_found(format!("payment channel {} for owner {}", id, owner_id)))
}

/// Find one of the owner's system payment channels by name
pub fn lookup_system_payment_channel(
    conn: &Connection,
    owner_id: i64,
    name: &str,
) -> Result<PaymentChannel> {
    conn.query_row(
        &format!(
            "SELECT {} FROM payment_channels WHERE owner_id = ? AND name = ? AND system_generated = 1",
            CHANNEL_COLUMNS
        ),
        params![owner_id, name],
        row_to_channel,
    )
    .optional()?
    .ok_or_else(|| {
        Error::Configuration(format!(
            "system payment channel '{}' is missing for owner {}",
            name, owner_id
        ))
    })
}

fn name_taken(conn: &Connection, table: &str, owner_id: i64, name: &str) -> Result<bool> {
    let existing: Option<i64> = conn
        .query_row(
            &format!("SELECT id FROM {} WHERE owner_id = ? AND name = ?", table),
            params![owner_id, name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(existing.is_some())
}

impl Database {
    /// Create a user-defined category
    pub fn create_category(
        &self,
        owner_id: i64,
        name: &str,
        kind: Direction,
        budgetable: bool,
    ) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("category name cannot be empty"));
        }

        let category = self.with_transaction(|conn| {
            super::users::require_user(conn, owner_id)?;
            if name_taken(conn, "categories", owner_id, name)? {
                return Err(Error::validation(format!(
                    "category '{}' already exists",
                    name
                )));
            }

            conn.execute(
                r#"
                INSERT INTO categories (owner_id, name, kind, budgetable, system_generated)
                VALUES (?, ?, ?, ?, 0)
                "#,
                params![owner_id, name, kind.as_str(), budgetable],
            )?;
            require_category(conn, owner_id, conn.last_insert_rowid())
        })?;

        info!(owner_id, category_id = category.id, category = %category.name, "Created category");
        Ok(category)
    }

    /// Activate or deactivate a user-defined category
    pub fn set_category_active(&self, owner_id: i64, id: i64, active: bool) -> Result<()> {
        self.with_transaction(|conn| {
            let category = require_category(conn, owner_id, id)?;
            if category.system_generated {
                return Err(Error::validation(format!(
                    "system category '{}' cannot be changed",
                    category.name
                )));
            }
            conn.execute(
                "UPDATE categories SET active = ? WHERE id = ?",
                params![active, id],
            )?;
            Ok(())
        })
    }

    pub fn get_category(&self, owner_id: i64, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        get_category(&conn, owner_id, id)
    }

    pub fn lookup_system_category(&self, owner_id: i64, name: &str) -> Result<Category> {
        let conn = self.conn()?;
        lookup_system_category(&conn, owner_id, name)
    }

    pub fn list_categories(&self, owner_id: i64) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM categories WHERE owner_id = ? ORDER BY name",
            CATEGORY_COLUMNS
        ))?;
        let categories = stmt
            .query_map(params![owner_id], row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Create a user-defined payment channel
    pub fn create_payment_channel(&self, owner_id: i64, name: &str) -> Result<PaymentChannel> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("payment channel name cannot be empty"));
        }

        self.with_transaction(|conn| {
            super::users::require_user(conn, owner_id)?;
            if name_taken(conn, "payment_channels", owner_id, name)? {
                return Err(Error::validation(format!(
                    "payment channel '{}' already exists",
                    name
                )));
            }

            conn.execute(
                "INSERT INTO payment_channels (owner_id, name, system_generated) VALUES (?, ?, 0)",
                params![owner_id, name],
            )?;
            require_payment_channel(conn, owner_id, conn.last_insert_rowid())
        })
    }

    pub fn lookup_system_payment_channel(
        &self,
        owner_id: i64,
        name: &str,
    ) -> Result<PaymentChannel> {
        let conn = self.conn()?;
        lookup_system_payment_channel(&conn, owner_id, name)
    }

    pub fn list_payment_channels(&self, owner_id: i64) -> Result<Vec<PaymentChannel>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM payment_channels WHERE owner_id = ? ORDER BY name",
            CHANNEL_COLUMNS
        ))?;
        let channels = stmt
            .query_map(params![owner_id], row_to_channel)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(channels)
    }
}
