use arnold_common::{Error, Result};
use rusqlite::Connection;

/// A single schema change that can be applied and reverted.
pub trait MigrationUnit {
    fn up(&self, conn: &Connection) -> Result<()>;

    fn down(&self, conn: &Connection) -> Result<()>;
}

/// A migration backed by SQL text, usually parsed from a `.sql` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlMigration {
    pub up_sql: String,
    pub down_sql: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Up,
    Down,
}

impl SqlMigration {
    pub fn new(up_sql: impl Into<String>, down_sql: impl Into<String>) -> Self {
        Self {
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
        }
    }

    /// Split file contents on `-- up` / `-- down` marker comments.
    ///
    /// Other comment lines and blank lines are dropped. Content before the
    /// first marker is ignored; a file without any marker is all `up`.
    pub fn parse(content: &str) -> Self {
        let mut preamble = Vec::new();
        let mut up = Vec::new();
        let mut down = Vec::new();
        let mut section = Section::Preamble;

        for line in content.lines() {
            let trimmed = line.trim();
            if let Some(marker) = section_marker(trimmed) {
                section = marker;
                continue;
            }
            if trimmed.is_empty() || trimmed.starts_with("--") {
                continue;
            }

            match section {
                Section::Preamble => preamble.push(line),
                Section::Up => up.push(line),
                Section::Down => down.push(line),
            }
        }

        let saw_marker = section != Section::Preamble;
        if !saw_marker {
            up = preamble;
        }

        Self {
            up_sql: up.join("\n").trim().to_string(),
            down_sql: down.join("\n").trim().to_string(),
        }
    }
}

fn section_marker(line: &str) -> Option<Section> {
    let comment = line.strip_prefix("--")?.trim().to_lowercase();
    match comment.as_str() {
        "up" | "up migration" => Some(Section::Up),
        "down" | "down migration" => Some(Section::Down),
        _ => None,
    }
}

fn execute(conn: &Connection, sql: &str, what: &str) -> Result<()> {
    if sql.trim().is_empty() {
        return Ok(());
    }
    conn.execute_batch(sql)
        .map_err(|e| Error::Database(format!("{what} script failed: {e}")))
}

impl MigrationUnit for SqlMigration {
    fn up(&self, conn: &Connection) -> Result<()> {
        execute(conn, &self.up_sql, "up")
    }

    fn down(&self, conn: &Connection) -> Result<()> {
        execute(conn, &self.down_sql, "down")
    }
}

/// A migration written as a pair of Rust functions, for compiled-in modules.
#[derive(Clone, Copy)]
pub struct FnMigration {
    up: fn(&Connection) -> Result<()>,
    down: fn(&Connection) -> Result<()>,
}

impl FnMigration {
    pub fn new(up: fn(&Connection) -> Result<()>, down: fn(&Connection) -> Result<()>) -> Self {
        Self { up, down }
    }
}

impl MigrationUnit for FnMigration {
    fn up(&self, conn: &Connection) -> Result<()> {
        (self.up)(conn)
    }

    fn down(&self, conn: &Connection) -> Result<()> {
        (self.down)(conn)
    }
}
