use arnold_common::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::schema::create_table;
use crate::tracking::{APPLIED_AT_FIELD, IDENTIFIER_FIELD, TrackingModel};

/// A row in the tracking table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigrationRecord {
    pub identifier: String,
    /// `None` when the table has no `applied_at` column or the stored value
    /// is not a recognised timestamp.
    pub applied_at: Option<DateTime<Utc>>,
}

/// Bookkeeping over the tracking table, borrowed from a caller-owned connection.
pub struct Registry<'c> {
    conn: &'c Connection,
    model: TrackingModel,
}

impl<'c> Registry<'c> {
    pub fn new(conn: &'c Connection, model: TrackingModel) -> Self {
        Self { conn, model }
    }

    pub fn connection(&self) -> &'c Connection {
        self.conn
    }

    pub fn model(&self) -> &TrackingModel {
        &self.model
    }

    /// Create the tracking table if it is missing.
    ///
    /// Returns `true` when the table was created by this call and `false`
    /// when it already existed.
    pub fn ensure_table(&self) -> Result<bool> {
        if self.table_exists()? {
            debug!("tracking table {} already exists", self.model.table());
            return Ok(false);
        }

        create_table(self.conn, &self.model, &self.model.field_names())?;
        info!("created tracking table {}", self.model.table());
        Ok(true)
    }

    pub fn table_exists(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![self.model.table()],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to inspect schema: {e}")))?;
        Ok(count > 0)
    }

    /// Whether the tracking table carries `column`. Tables built with an
    /// explicit field list may omit optional columns.
    pub fn has_column(&self, column: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
                params![self.model.table(), column],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to inspect columns: {e}")))?;
        Ok(count > 0)
    }

    pub fn drop_table(&self) -> Result<()> {
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {}", self.model.quoted_table()))
            .map_err(|e| Error::Database(format!("failed to drop tracking table: {e}")))?;
        Ok(())
    }

    pub fn has_applied(&self, identifier: &str) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE {IDENTIFIER_FIELD} = ?1 LIMIT 1",
            self.model.quoted_table()
        );
        let found = self
            .conn
            .query_row(&sql, params![identifier], |_| Ok(()))
            .optional()
            .map_err(|e| Error::Database(format!("failed to check migration {identifier}: {e}")))?;
        Ok(found.is_some())
    }

    pub fn record_applied(&self, identifier: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} ({IDENTIFIER_FIELD}) VALUES (?1)",
            self.model.quoted_table()
        );
        self.conn
            .execute(&sql, params![identifier])
            .map_err(|e| Error::Database(format!("failed to record migration {identifier}: {e}")))?;
        Ok(())
    }

    pub fn record_reverted(&self, identifier: &str) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {IDENTIFIER_FIELD} = ?1",
            self.model.quoted_table()
        );
        self.conn
            .execute(&sql, params![identifier])
            .map_err(|e| Error::Database(format!("failed to remove migration {identifier}: {e}")))?;
        Ok(())
    }

    /// All applied migrations, ordered by identifier.
    pub fn applied(&self) -> Result<Vec<MigrationRecord>> {
        let applied_at = if self.has_column(APPLIED_AT_FIELD)? {
            APPLIED_AT_FIELD
        } else {
            "NULL"
        };
        let sql = format!(
            "SELECT {IDENTIFIER_FIELD}, {applied_at} FROM {} ORDER BY {IDENTIFIER_FIELD} ASC",
            self.model.quoted_table()
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(MigrationRecord {
                    identifier: row.get(0)?,
                    applied_at: row
                        .get::<_, Option<String>>(1)?
                        .as_deref()
                        .and_then(parse_datetime),
                })
            })
            .map_err(|e| Error::Database(format!("failed to query applied migrations: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(
                row.map_err(|e| Error::Database(format!("failed to read migration row: {e}")))?,
            );
        }
        Ok(records)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') produces "YYYY-MM-DD HH:MM:SS"
    match chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            warn!("unrecognised applied_at value {s:?}: {e}");
            None
        }
    }
}
