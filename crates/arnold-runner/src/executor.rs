use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use arnold_common::{Error, Result};
use arnold_db::Registry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::loader::{list_candidates, load};
use crate::source::Source;
use crate::unit::MigrationUnit;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Apply forward.
    #[default]
    Up,
    /// Revert.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Up => "up",
            Direction::Down => "down",
        })
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown direction {other:?}, expected \"up\" or \"down\""
            ))),
        }
    }
}

/// Lifecycle of one unit within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Pending,
    Running,
    Applied,
    Skipped,
    Reverted,
    Failed,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MigrationState::Pending => "pending",
            MigrationState::Running => "running",
            MigrationState::Applied => "applied",
            MigrationState::Skipped => "skipped",
            MigrationState::Reverted => "reverted",
            MigrationState::Failed => "failed",
        })
    }
}

fn transition(identifier: &str, state: MigrationState) {
    debug!(migration = identifier, %state, "migration state changed");
}

/// Apply or revert a single migration.
///
/// Returns `Ok(false)` without touching the database when there is nothing
/// to do: the unit is already applied (up) or not applied (down). A unit that
/// cannot be resolved at `source` is an error in both directions.
pub fn run_single(
    direction: Direction,
    registry: &Registry<'_>,
    identifier: &str,
    source: Source<'_>,
) -> Result<bool> {
    transition(identifier, MigrationState::Pending);
    let unit = load(identifier, source)?;
    let applied = registry.has_applied(identifier)?;

    let pending = match direction {
        Direction::Up => !applied,
        Direction::Down => applied,
    };
    if !pending {
        debug!("nothing to do for {direction} {identifier}");
        transition(identifier, MigrationState::Skipped);
        return Ok(false);
    }

    transition(identifier, MigrationState::Running);
    let conn = registry.connection();
    let outcome = match direction {
        Direction::Up => unit
            .up(conn)
            .and_then(|()| registry.record_applied(identifier)),
        Direction::Down => unit
            .down(conn)
            .and_then(|()| registry.record_reverted(identifier)),
    };

    if let Err(e) = outcome {
        warn!("migration {identifier} failed going {direction}: {e}");
        transition(identifier, MigrationState::Failed);
        return Err(e);
    }

    match direction {
        Direction::Up => {
            info!("applied migration {identifier}");
            transition(identifier, MigrationState::Applied);
        }
        Direction::Down => {
            info!("reverted migration {identifier}");
            transition(identifier, MigrationState::Reverted);
        }
    }
    Ok(true)
}

/// The identifiers a pass visits, in the order it visits them.
///
/// Ignored identifiers are dropped in both directions. A target keeps every
/// candidate up to and including it; `down` then walks that prefix backwards
/// starting at the target.
pub fn plan(
    direction: Direction,
    source: Source<'_>,
    target: Option<&str>,
    ignored: &BTreeSet<String>,
) -> Result<Vec<String>> {
    let candidates = list_candidates(source)?;

    if let Some(target) = target {
        if !candidates.contains(target) {
            return Err(Error::UnitNotFound(format!("{target} in {source}")));
        }
    }

    let mut plan: Vec<String> = candidates
        .iter()
        .filter(|id| !ignored.contains(*id))
        .filter(|id| target.is_none_or(|target| *id <= target))
        .map(str::to_string)
        .collect();

    if direction == Direction::Down {
        plan.reverse();
    }
    Ok(plan)
}

/// Run every pending migration at `source` in `direction`.
///
/// Skipped units are not failures. The first error aborts the pass; units
/// completed before it stay recorded.
pub fn run_all(
    direction: Direction,
    registry: &Registry<'_>,
    source: Source<'_>,
    target: Option<&str>,
    ignored: &BTreeSet<String>,
) -> Result<bool> {
    let plan = plan(direction, source, target, ignored)?;
    info!(
        "running {} migrations {direction} from {source}",
        plan.len()
    );

    let mut changed = 0usize;
    for identifier in &plan {
        if run_single(direction, registry, identifier, source)? {
            changed += 1;
        }
    }

    info!(
        "{direction} pass complete: {changed} changed, {} skipped",
        plan.len() - changed
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use arnold_db::TrackingModel;
    use rusqlite::Connection;

    use super::*;
    use crate::source::MigrationModule;
    use crate::unit::SqlMigration;

    /// Records every call so ordering can be asserted.
    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl MigrationUnit for Recorder {
        fn up(&self, _conn: &Connection) -> Result<()> {
            self.log.borrow_mut().push(format!("up {}", self.name));
            Ok(())
        }

        fn down(&self, _conn: &Connection) -> Result<()> {
            self.log.borrow_mut().push(format!("down {}", self.name));
            Ok(())
        }
    }

    fn recording_module(log: &Rc<RefCell<Vec<String>>>) -> MigrationModule {
        ["003_posts", "001_initial", "002_users"]
            .into_iter()
            .fold(MigrationModule::new("test"), |module, name| {
                module.register(
                    name,
                    Recorder {
                        name,
                        log: Rc::clone(log),
                    },
                )
            })
    }

    fn setup(conn: &Connection) -> Registry<'_> {
        let registry = Registry::new(conn, TrackingModel::default());
        registry.ensure_table().unwrap();
        registry
    }

    fn ignore(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn direction_parses_and_displays() {
        assert_eq!("UP".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("down".parse::<Direction>().unwrap(), Direction::Down);
        assert!("sideways".parse::<Direction>().is_err());
        assert_eq!(Direction::default().to_string(), "up");
    }

    #[test]
    fn single_up_is_idempotent_and_down_round_trips() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = setup(&conn);
        let module = MigrationModule::new("test").register(
            "001_initial",
            SqlMigration::new("CREATE TABLE a (id INTEGER);", "DROP TABLE a;"),
        );
        let source = Source::Module(&module);

        assert!(run_single(Direction::Up, &registry, "001_initial", source).unwrap());
        assert!(registry.has_applied("001_initial").unwrap());
        assert!(!run_single(Direction::Up, &registry, "001_initial", source).unwrap());
        assert_eq!(registry.applied().unwrap().len(), 1);

        assert!(run_single(Direction::Down, &registry, "001_initial", source).unwrap());
        assert!(!registry.has_applied("001_initial").unwrap());
        assert!(!run_single(Direction::Down, &registry, "001_initial", source).unwrap());
    }

    #[test]
    fn unknown_unit_fails_in_both_directions() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = setup(&conn);
        let module = MigrationModule::new("test");

        for direction in [Direction::Up, Direction::Down] {
            let err = run_single(direction, &registry, "bad", Source::Module(&module)).unwrap_err();
            assert!(err.is_unit_not_found());
        }
    }

    #[test]
    fn failed_unit_is_not_recorded() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = setup(&conn);
        let module = MigrationModule::new("test")
            .register("001_broken", SqlMigration::new("NOT SQL", ""));

        let err = run_single(Direction::Up, &registry, "001_broken", Source::Module(&module))
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert!(!registry.has_applied("001_broken").unwrap());
    }

    #[test]
    fn run_all_orders_by_identifier() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = setup(&conn);
        let log = Rc::new(RefCell::new(Vec::new()));
        let module = recording_module(&log);
        let source = Source::Module(&module);
        let none = BTreeSet::new();

        assert!(run_all(Direction::Up, &registry, source, None, &none).unwrap());
        assert!(run_all(Direction::Down, &registry, source, None, &none).unwrap());

        assert_eq!(
            *log.borrow(),
            vec![
                "up 001_initial",
                "up 002_users",
                "up 003_posts",
                "down 003_posts",
                "down 002_users",
                "down 001_initial",
            ]
        );
        assert!(registry.applied().unwrap().is_empty());
    }

    #[test]
    fn run_all_skips_already_applied() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = setup(&conn);
        let log = Rc::new(RefCell::new(Vec::new()));
        let module = recording_module(&log);
        registry.record_applied("002_users").unwrap();

        let source = Source::Module(&module);
        assert!(run_all(Direction::Up, &registry, source, None, &BTreeSet::new()).unwrap());
        assert_eq!(*log.borrow(), vec!["up 001_initial", "up 003_posts"]);
    }

    #[test]
    fn ignored_units_are_excluded_in_both_directions() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = setup(&conn);
        let log = Rc::new(RefCell::new(Vec::new()));
        let module = recording_module(&log);
        let source = Source::Module(&module);
        let ignored = ignore(&["002_users"]);

        run_all(Direction::Up, &registry, source, None, &ignored).unwrap();
        assert!(!registry.has_applied("002_users").unwrap());

        // applied out of band; an ignored unit is never reverted either
        registry.record_applied("002_users").unwrap();
        run_all(Direction::Down, &registry, source, None, &ignored).unwrap();
        assert!(registry.has_applied("002_users").unwrap());

        assert_eq!(
            *log.borrow(),
            vec![
                "up 001_initial",
                "up 003_posts",
                "down 003_posts",
                "down 001_initial",
            ]
        );
    }

    #[test]
    fn target_cutoff_is_inclusive_in_both_directions() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let module = recording_module(&log);
        let source = Source::Module(&module);
        let none = BTreeSet::new();

        assert_eq!(
            plan(Direction::Up, source, Some("002_users"), &none).unwrap(),
            vec!["001_initial", "002_users"]
        );
        assert_eq!(
            plan(Direction::Down, source, Some("002_users"), &none).unwrap(),
            vec!["002_users", "001_initial"]
        );
        assert_eq!(
            plan(Direction::Down, source, None, &none).unwrap(),
            vec!["003_posts", "002_users", "001_initial"]
        );
    }

    #[test]
    fn target_must_exist() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = setup(&conn);
        let log = Rc::new(RefCell::new(Vec::new()));
        let module = recording_module(&log);

        let err = run_all(
            Direction::Up,
            &registry,
            Source::Module(&module),
            Some("999_missing"),
            &BTreeSet::new(),
        )
        .unwrap_err();
        assert!(err.is_unit_not_found());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn failure_keeps_earlier_units_applied() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = setup(&conn);
        let module = MigrationModule::new("test")
            .register("001_initial", SqlMigration::new("CREATE TABLE a (id INTEGER);", ""))
            .register("002_broken", SqlMigration::new("NOT SQL", ""))
            .register("003_never", SqlMigration::new("CREATE TABLE c (id INTEGER);", ""));

        let result = run_all(
            Direction::Up,
            &registry,
            Source::Module(&module),
            None,
            &BTreeSet::new(),
        );
        assert!(result.is_err());

        let applied: Vec<_> = registry
            .applied()
            .unwrap()
            .into_iter()
            .map(|r| r.identifier)
            .collect();
        assert_eq!(applied, vec!["001_initial"]);
    }
}
