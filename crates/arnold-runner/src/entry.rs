//! Configuration surface that validates inputs and drives a full pass.

use std::collections::BTreeSet;
use std::path::PathBuf;

use arnold_common::{Error, Result};
use arnold_db::{Registry, TrackingModel};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::executor::{Direction, run_all};
use crate::loader::list_candidates;
use crate::source::{MigrationModule, Source};

/// Builder for a migration run against a caller-owned connection.
///
/// ```no_run
/// # use rusqlite::Connection;
/// # use arnold_runner::Migrator;
/// let conn = Connection::open("app.db")?;
/// let ok = Migrator::new()
///     .database(&conn)
///     .directory("migrations")
///     .run()?;
/// assert!(ok);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Default)]
pub struct Migrator<'c> {
    database: Option<&'c Connection>,
    directory: Option<PathBuf>,
    module: Option<MigrationModule>,
    migration: Option<String>,
    ignored: BTreeSet<String>,
    direction: Direction,
    model: TrackingModel,
}

/// Applied/pending view of one candidate.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MigrationStatus {
    pub identifier: String,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
    pub ignored: bool,
}

impl<'c> Migrator<'c> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database(mut self, conn: &'c Connection) -> Self {
        self.database = Some(conn);
        self
    }

    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directory = Some(dir.into());
        self
    }

    pub fn module(mut self, module: MigrationModule) -> Self {
        self.module = Some(module);
        self
    }

    /// Stop the pass at this identifier (inclusive).
    pub fn migration(mut self, identifier: impl Into<String>) -> Self {
        self.migration = Some(identifier.into());
        self
    }

    pub fn ignored<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored.extend(identifiers.into_iter().map(Into::into));
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Track applied migrations in a table other than `migration`.
    pub fn model(mut self, model: TrackingModel) -> Self {
        self.model = model;
        self
    }

    fn validate(&self) -> Result<(&'c Connection, Source<'_>)> {
        let conn = self.database.ok_or(Error::MissingDatabase)?;
        let source = match (&self.directory, &self.module) {
            (Some(dir), None) => Source::Directory(dir.as_path()),
            (None, Some(module)) => Source::Module(module),
            (Some(_), Some(_)) => {
                return Err(Error::InvalidConfiguration(
                    "directory and module are mutually exclusive".into(),
                ));
            }
            (None, None) => {
                return Err(Error::InvalidConfiguration(
                    "one of directory or module is required".into(),
                ));
            }
        };
        Ok((conn, source))
    }

    /// Validate, make sure the tracking table exists, then run the pass.
    pub fn run(&self) -> Result<bool> {
        let (conn, source) = self.validate()?;
        let registry = Registry::new(conn, self.model.clone());
        if registry.ensure_table()? {
            info!("initialised tracking table {}", self.model.table());
        }

        run_all(
            self.direction,
            &registry,
            source,
            self.migration.as_deref(),
            &self.ignored,
        )
    }

    /// Report every candidate at the source with its applied state.
    ///
    /// Read-only: a missing tracking table means nothing is applied.
    pub fn status(&self) -> Result<Vec<MigrationStatus>> {
        let (conn, source) = self.validate()?;
        let registry = Registry::new(conn, self.model.clone());

        let applied = if registry.table_exists()? {
            registry.applied()?
        } else {
            Vec::new()
        };

        let candidates = list_candidates(source)?;
        Ok(candidates
            .iter()
            .map(|identifier| {
                let record = applied.iter().find(|r| r.identifier == identifier);
                MigrationStatus {
                    identifier: identifier.to_string(),
                    applied: record.is_some(),
                    applied_at: record.and_then(|r| r.applied_at),
                    ignored: self.ignored.contains(identifier),
                }
            })
            .collect())
    }
}
