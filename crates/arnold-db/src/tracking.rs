/// A column the tracking table may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub definition: &'static str,
}

pub const ID_FIELD: &str = "id";
pub const IDENTIFIER_FIELD: &str = "migration";
pub const APPLIED_AT_FIELD: &str = "applied_at";

const FIELDS: &[Field] = &[
    Field {
        name: ID_FIELD,
        definition: "INTEGER PRIMARY KEY AUTOINCREMENT",
    },
    Field {
        name: IDENTIFIER_FIELD,
        definition: "TEXT NOT NULL UNIQUE",
    },
    Field {
        name: APPLIED_AT_FIELD,
        definition: "TEXT NOT NULL DEFAULT (datetime('now'))",
    },
];

/// Describes the table that records which migrations have been applied.
///
/// Only the table name varies; the declared fields are fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingModel {
    table: String,
}

impl TrackingModel {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// The table name quoted for interpolation into SQL.
    pub fn quoted_table(&self) -> String {
        format!("\"{}\"", self.table.replace('"', "\"\""))
    }

    pub fn fields(&self) -> &'static [Field] {
        FIELDS
    }

    pub fn field(&self, name: &str) -> Option<&'static Field> {
        FIELDS.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        FIELDS.iter().map(|f| f.name).collect()
    }
}

impl Default for TrackingModel {
    fn default() -> Self {
        Self::new("migration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_declares_identifier_column() {
        let model = TrackingModel::default();
        assert_eq!(model.table(), "migration");
        assert_eq!(model.field_names(), vec!["id", "migration", "applied_at"]);
        assert!(model.field(IDENTIFIER_FIELD).unwrap().definition.contains("UNIQUE"));
        assert!(model.field("bad_field").is_none());
    }

    #[test]
    fn quotes_table_names() {
        assert_eq!(TrackingModel::new("schema history").quoted_table(), "\"schema history\"");
        assert_eq!(TrackingModel::new("a\"b").quoted_table(), "\"a\"\"b\"");
    }
}
