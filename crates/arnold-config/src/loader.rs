use std::path::Path;

use arnold_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

/// Reads an [`AppConfig`] from YAML or TOML, picking the parser by extension.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the config at `path`. A missing file yields the defaults so that
    /// `arnold` works in a bare project with only a `migrations/` directory.
    pub fn load(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(AppConfig::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::parse(path, &contents)?;
        info!("config loaded from {}", path.display());
        Ok(config)
    }

    pub fn parse(path: &Path, contents: &str) -> Result<AppConfig> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yml" | "yaml" => serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
            "toml" => {
                toml::from_str(contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
            }
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }

    /// Serialize `config` to `path`, creating parent directories as needed.
    pub fn save(path: &Path, config: &AppConfig) -> Result<()> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let rendered = match ext {
            "yml" | "yaml" => serde_yaml::to_string(config)
                .map_err(|e| Error::Config(format!("YAML serialize error: {e}")))?,
            "toml" => toml::to_string_pretty(config)
                .map_err(|e| Error::Config(format!("TOML serialize error: {e}")))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other}"
                )));
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, rendered)?;
        Ok(())
    }
}
