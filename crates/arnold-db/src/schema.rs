use arnold_common::{Error, Result};
use rusqlite::Connection;
use tracing::debug;

use crate::tracking::TrackingModel;

/// Create the tracking table with an explicit subset of the model's fields.
///
/// Fields are emitted in the order given. An empty list and names the model
/// does not declare are rejected before any SQL runs.
pub fn create_table(conn: &Connection, model: &TrackingModel, fields: &[&str]) -> Result<()> {
    if fields.is_empty() {
        return Err(Error::FieldsRequired);
    }

    let mut columns = Vec::with_capacity(fields.len());
    for name in fields {
        let field = model
            .field(name)
            .ok_or_else(|| Error::FieldNotFound((*name).to_string()))?;
        columns.push(format!("{} {}", field.name, field.definition));
    }

    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        model.quoted_table(),
        columns.join(", ")
    );
    debug!("creating tracking table: {sql}");

    conn.execute_batch(&sql)
        .map_err(|e| Error::Database(format!("failed to create table {}: {e}", model.table())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count > 0
    }

    #[test]
    fn creates_table_with_listed_fields() {
        let conn = Connection::open_in_memory().unwrap();
        let model = TrackingModel::default();

        create_table(&conn, &model, &["id", "migration"]).unwrap();
        assert!(table_exists(&conn, "migration"));

        let columns: Vec<String> = conn
            .prepare("SELECT name FROM pragma_table_info('migration')")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(columns, vec!["id", "migration"]);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let model = TrackingModel::default();

        let err = create_table(&conn, &model, &["id", "migration", "bad_field"]).unwrap_err();
        assert!(matches!(err, Error::FieldNotFound(ref name) if name == "bad_field"));
        assert!(!table_exists(&conn, "migration"));
    }

    #[test]
    fn empty_field_list_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let err = create_table(&conn, &TrackingModel::default(), &[]).unwrap_err();
        assert!(matches!(err, Error::FieldsRequired));
    }
}
