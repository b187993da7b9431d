use std::fs;
use std::path::{Path, PathBuf};

use arnold_common::{Error, Result};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::source::{MigrationModule, Source, is_migration_identifier};
use crate::unit::{MigrationUnit, SqlMigration};

const EXTENSION: &str = "sql";

/// Migration identifiers discovered at a source, in ascending order.
///
/// Iterating does not consume the list, so a pass can be replanned from the
/// same candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    identifiers: Vec<String>,
}

impl Candidates {
    fn new(mut identifiers: Vec<String>) -> Self {
        identifiers.sort();
        identifiers.dedup();
        Self { identifiers }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.identifiers.iter().map(String::as_str)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.identifiers
            .binary_search_by(|probe| probe.as_str().cmp(identifier))
            .is_ok()
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

impl<'a> IntoIterator for &'a Candidates {
    type Item = &'a str;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, String>, fn(&'a String) -> &'a str>;

    fn into_iter(self) -> Self::IntoIter {
        self.identifiers
            .iter()
            .map(String::as_str as fn(&'a String) -> &'a str)
    }
}

/// A unit resolved from a source. File units are owned, module units borrowed.
pub enum Loaded<'s> {
    File(SqlMigration),
    Module(&'s dyn MigrationUnit),
}

impl MigrationUnit for Loaded<'_> {
    fn up(&self, conn: &Connection) -> Result<()> {
        match self {
            Loaded::File(unit) => unit.up(conn),
            Loaded::Module(unit) => unit.up(conn),
        }
    }

    fn down(&self, conn: &Connection) -> Result<()> {
        match self {
            Loaded::File(unit) => unit.down(conn),
            Loaded::Module(unit) => unit.down(conn),
        }
    }
}

/// List every migration identifier at `source`, sorted ascending.
pub fn list_candidates(source: Source<'_>) -> Result<Candidates> {
    let identifiers = match source {
        Source::Directory(dir) => scan_directory(dir)?,
        Source::Module(module) => scan_module(module),
    };
    debug!("found {} migrations in {source}", identifiers.len());
    Ok(Candidates::new(identifiers))
}

fn scan_directory(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(Error::InvalidConfiguration(format!(
            "migration directory {} does not exist",
            dir.display()
        )));
    }

    let mut identifiers = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != EXTENSION) {
            continue;
        }
        match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) if is_migration_identifier(stem) => identifiers.push(stem.to_string()),
            _ => debug!("skipping non-migration file {}", path.display()),
        }
    }
    Ok(identifiers)
}

fn scan_module(module: &MigrationModule) -> Vec<String> {
    module
        .identifiers()
        .filter(|id| {
            let keep = is_migration_identifier(id);
            if !keep {
                debug!("skipping non-migration member {id} in {}", module.name());
            }
            keep
        })
        .map(str::to_string)
        .collect()
}

/// Resolve `identifier` at `source`.
pub fn load<'s>(identifier: &str, source: Source<'s>) -> Result<Loaded<'s>> {
    let not_found = || Error::UnitNotFound(format!("{identifier} in {source}"));

    if !is_migration_identifier(identifier) {
        return Err(not_found());
    }

    match source {
        Source::Directory(dir) => {
            let path = dir.join(format!("{identifier}.{EXTENSION}"));
            if !path.is_file() {
                return Err(not_found());
            }
            let content = fs::read_to_string(&path)?;
            Ok(Loaded::File(SqlMigration::parse(&content)))
        }
        Source::Module(module) => module.get(identifier).map(Loaded::Module).ok_or_else(not_found),
    }
}

/// Write a new, empty migration file to `dir` using the next sequence number.
///
/// The prefix width follows the widest existing prefix, with a minimum of
/// three digits.
pub fn new_migration(dir: &Path, name: &str) -> Result<PathBuf> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(Error::Other(format!(
            "migration name {name:?} has no usable characters"
        )));
    }

    fs::create_dir_all(dir)?;
    let existing = scan_directory(dir)?;

    let mut width = 3;
    let mut last = 0u64;
    for id in &existing {
        let Some((prefix, _)) = id.split_once('_') else {
            continue;
        };
        width = width.max(prefix.len());
        if let Ok(n) = prefix.parse::<u64>() {
            last = last.max(n);
        }
    }

    let identifier = format!("{:0width$}_{slug}", last + 1);
    let path = dir.join(format!("{identifier}.{EXTENSION}"));
    let template = format!(
        "-- Migration: {name}\n\
         -- Created: {}\n\n\
         -- up\n\n\n\
         -- down\n\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    fs::write(&path, template)?;

    info!("created migration {}", path.display());
    Ok(path)
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}
