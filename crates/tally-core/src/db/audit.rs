//! Audit log operations

use rusqlite::{params, Connection};
use serde::Serialize;

use super::Database;
use crate::error::Result;

/// Actor recorded for entries written by the daily tick
pub const SCHEDULER_ACTOR: &str = "scheduler";

/// One row of the append-only audit log
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub actor: String,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub details: Option<String>,
}

/// Append an audit event on the caller's connection
pub fn log_audit(
    conn: &Connection,
    actor: &str,
    action: &str,
    entity_type: Option<&str>,
    entity_id: Option<i64>,
    details: Option<&str>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO audit_log (actor, action, entity_type, entity_id, details)
        VALUES (?, ?, ?, ?, ?)
        "#,
        params![actor, action, entity_type, entity_id, details],
    )?;

    Ok(conn.last_insert_rowid())
}

impl Database {
    /// List audit log entries, newest first
    pub fn list_audit(&self, limit: i64) -> Result<Vec<AuditEntry>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, timestamp, actor, action, entity_type, entity_id, details
            FROM audit_log
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;

        let entries = stmt
            .query_map(params![limit], |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    actor: row.get(2)?,
                    action: row.get(3)?,
                    entity_type: row.get(4)?,
                    entity_id: row.get(5)?,
                    details: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}
