pub mod entry;
pub mod executor;
pub mod loader;
pub mod source;
pub mod unit;

pub use entry::{MigrationStatus, Migrator};
pub use executor::{Direction, MigrationState, plan, run_all, run_single};
pub use loader::{Candidates, Loaded, list_candidates, load, new_migration};
pub use source::{MigrationModule, Source, is_migration_identifier};
pub use unit::{FnMigration, MigrationUnit, SqlMigration};
