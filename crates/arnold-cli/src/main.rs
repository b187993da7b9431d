mod status;
mod wizard;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use arnold_config::{AppConfig, ConfigLoader};
use arnold_db::TrackingModel;
use arnold_runner::{Direction, Migrator, new_migration};
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "arnold", version, about = "Simple schema migrations for SQLite")]
struct Cli {
    /// Path to the config file (YAML or TOML)
    #[arg(short, long, global = true, default_value = "arnold.yml")]
    config: PathBuf,

    /// SQLite database path, overrides the config file
    #[arg(long, global = true, env = "ARNOLD_DATABASE")]
    database: Option<PathBuf>,

    /// Migrations directory, overrides the config file
    #[arg(long, global = true, env = "ARNOLD_DIRECTORY")]
    directory: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations
    Up(RunArgs),
    /// Revert applied migrations
    Down(RunArgs),
    /// Show applied and pending migrations
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Create a new, empty migration file
    New {
        /// Short description, e.g. "create users"
        name: String,
    },
    /// Write a config file and create the tracking table
    Init,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Stop at this migration (inclusive)
    #[arg(short, long)]
    migration: Option<String>,

    /// Skip this migration; may be repeated
    #[arg(short, long = "ignore", value_name = "MIGRATION")]
    ignore: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(database) = &cli.database {
        config.database.path = database.clone();
    }
    if let Some(directory) = &cli.directory {
        config.migrations.directory = directory.clone();
    }

    init_tracing(cli.verbose, config.log_level.as_deref());
    if cli.config.exists() {
        info!("using config {}", cli.config.display());
    } else {
        debug!("no config at {}, using defaults", cli.config.display());
    }

    match cli.command {
        Command::Up(args) => migrate(&config, Direction::Up, args),
        Command::Down(args) => migrate(&config, Direction::Down, args),
        Command::Status { json } => status(&config, json),
        Command::New { name } => {
            let path = new_migration(&config.migrations.directory, &name)?;
            println!("Created {}", path.display());
            Ok(())
        }
        Command::Init => wizard::run_wizard(&cli.config, config),
    }
}

fn init_tracing(verbose: bool, configured: Option<&str>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or("info")))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn open_database(config: &AppConfig) -> Result<Connection> {
    let path = &config.database.path;
    Connection::open(path).with_context(|| format!("failed to open database {}", path.display()))
}

fn migrator<'c>(config: &AppConfig, conn: &'c Connection) -> Migrator<'c> {
    Migrator::new()
        .database(conn)
        .directory(&config.migrations.directory)
        .model(TrackingModel::new(&config.migrations.table))
        .ignored(config.migrations.ignored.iter().cloned())
}

fn migrate(config: &AppConfig, direction: Direction, args: RunArgs) -> Result<()> {
    let conn = open_database(config)?;
    let mut migrator = migrator(config, &conn)
        .direction(direction)
        .ignored(args.ignore);
    if let Some(target) = args.migration {
        migrator = migrator.migration(target);
    }

    info!(
        "migrating {direction} using {}",
        config.migrations.directory.display()
    );
    if !migrator.run()? {
        bail!("migration pass did not complete");
    }
    println!("Migrations complete ({direction}).");
    Ok(())
}

fn status(config: &AppConfig, json: bool) -> Result<()> {
    let conn = open_database(config)?;
    let statuses = migrator(config, &conn).status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        let source = format!("directory {}", display_dir(&config.migrations.directory));
        println!("{}", status::render_status(&source, &statuses));
    }
    Ok(())
}

fn display_dir(dir: &Path) -> String {
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => dir.to_string_lossy().replace(&home, "~"),
        _ => dir.to_string_lossy().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_arguments() {
        let cli = Cli::parse_from([
            "arnold",
            "--database",
            "app.db",
            "down",
            "--migration",
            "002_users",
            "--ignore",
            "001_initial",
            "-i",
            "003_seed",
        ]);

        assert_eq!(cli.database, Some(PathBuf::from("app.db")));
        match cli.command {
            Command::Down(args) => {
                assert_eq!(args.migration.as_deref(), Some("002_users"));
                assert_eq!(args.ignore, vec!["001_initial", "003_seed"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn migrate_then_status_against_a_scratch_project() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.database.path = dir.path().join("app.db");
        config.migrations.directory = dir.path().join("migrations");

        new_migration(&config.migrations.directory, "initial").unwrap();
        migrate(
            &config,
            Direction::Up,
            RunArgs {
                migration: None,
                ignore: Vec::new(),
            },
        )
        .unwrap();

        let conn = open_database(&config).unwrap();
        let statuses = migrator(&config, &conn).status().unwrap();
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].applied);
    }
}
