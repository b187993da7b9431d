use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arnold_config::{AppConfig, ConfigLoader};
use arnold_db::{Registry, TrackingModel};
use dialoguer::{Confirm, Input};
use rusqlite::Connection;
use tracing::info;

/// Run the interactive setup wizard. Writes the config file, creates the
/// migrations directory and the tracking table.
pub fn run_wizard(config_path: &Path, defaults: AppConfig) -> Result<()> {
    if !std::io::stdin().is_terminal() {
        println!("Non-interactive environment detected.");
        println!("To configure Arnold, create: {}", config_path.display());
        println!();
        println!("Minimal arnold.yml example:");
        println!("---");
        println!("database:");
        println!("  path: app.db");
        println!("migrations:");
        println!("  directory: migrations");
        println!("  table: migration");
        return Ok(());
    }

    if config_path.exists() {
        let overwrite = Confirm::new()
            .with_prompt(format!("{} exists. Overwrite?", config_path.display()))
            .default(false)
            .interact()
            .context("overwrite confirmation cancelled")?;
        if !overwrite {
            println!("  Keeping existing config.");
            return Ok(());
        }
    }

    println!();
    println!("  Arnold Setup");
    println!("  ------------");
    println!();

    let database: String = Input::new()
        .with_prompt("SQLite database path")
        .default(defaults.database.path.display().to_string())
        .interact_text()
        .context("database path input cancelled")?;

    let directory: String = Input::new()
        .with_prompt("Migrations directory")
        .default(defaults.migrations.directory.display().to_string())
        .interact_text()
        .context("directory input cancelled")?;

    let table: String = Input::new()
        .with_prompt("Tracking table name")
        .default(defaults.migrations.table.clone())
        .interact_text()
        .context("table name input cancelled")?;

    let mut config = defaults;
    config.database.path = PathBuf::from(database.trim());
    config.migrations.directory = PathBuf::from(directory.trim());
    config.migrations.table = table.trim().to_string();

    initialise(config_path, &config)?;

    println!();
    println!("  Config written to {}", config_path.display());
    println!("  Run `arnold new <name>` to add your first migration.");
    println!();
    Ok(())
}

/// Persist `config` and prepare the directory and tracking table it names.
pub fn initialise(config_path: &Path, config: &AppConfig) -> Result<()> {
    ConfigLoader::save(config_path, config)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    info!("config written to {}", config_path.display());

    std::fs::create_dir_all(&config.migrations.directory).with_context(|| {
        format!(
            "failed to create {}",
            config.migrations.directory.display()
        )
    })?;

    let conn = Connection::open(&config.database.path)
        .with_context(|| format!("failed to open {}", config.database.path.display()))?;
    let registry = Registry::new(&conn, TrackingModel::new(&config.migrations.table));
    if registry.ensure_table()? {
        println!("  Created tracking table {}", config.migrations.table);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialise_writes_config_directory_and_table() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("arnold.yml");

        let mut config = AppConfig::default();
        config.database.path = dir.path().join("app.db");
        config.migrations.directory = dir.path().join("migrations");
        config.migrations.table = "schema_history".to_string();

        initialise(&config_path, &config).unwrap();

        assert_eq!(ConfigLoader::load(&config_path).unwrap(), config);
        assert!(config.migrations.directory.is_dir());

        let conn = Connection::open(&config.database.path).unwrap();
        let registry = Registry::new(&conn, TrackingModel::new("schema_history"));
        assert!(registry.table_exists().unwrap());
    }
}
