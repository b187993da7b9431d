use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::unit::MigrationUnit;

/// Sortable numeric prefix, an underscore, then a description.
static IDENTIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]+_[A-Za-z0-9_]+$").expect("identifier pattern is valid")
});

/// Whether `name` looks like a migration identifier such as `001_initial`.
pub fn is_migration_identifier(name: &str) -> bool {
    IDENTIFIER_PATTERN.is_match(name)
}

/// Where migration units are discovered.
#[derive(Clone, Copy)]
pub enum Source<'a> {
    /// A directory of `NNN_description.sql` files.
    Directory(&'a Path),
    /// A compiled-in set of units registered by identifier.
    Module(&'a MigrationModule),
}

impl fmt::Display for Source<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Directory(path) => write!(f, "directory {}", path.display()),
            Source::Module(module) => write!(f, "module {}", module.name()),
        }
    }
}

/// A named namespace of migration units populated by explicit registration.
pub struct MigrationModule {
    name: String,
    units: BTreeMap<String, Box<dyn MigrationUnit>>,
}

impl MigrationModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register `unit` under `identifier`, replacing any previous entry.
    pub fn register(
        mut self,
        identifier: impl Into<String>,
        unit: impl MigrationUnit + 'static,
    ) -> Self {
        self.units.insert(identifier.into(), Box::new(unit));
        self
    }

    pub fn get(&self, identifier: &str) -> Option<&dyn MigrationUnit> {
        self.units.get(identifier).map(|unit| unit.as_ref())
    }

    /// Registered identifiers in ascending order, including ones that do not
    /// match the identifier pattern.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl fmt::Debug for MigrationModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationModule")
            .field("name", &self.name)
            .field("units", &self.units.keys().collect::<Vec<_>>())
            .finish()
    }
}
