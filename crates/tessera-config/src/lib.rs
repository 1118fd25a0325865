//! Configuration management for Tessera
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence)
//! 2. Environment variables (TESSERA_* prefix, `__` between nested keys)
//! 3. tessera.local.toml (gitignored, local overrides)
//! 4. tessera.toml (git-tracked, project config)
//! 5. ~/.config/tessera/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tessera_abac::AbacConfig;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main Tessera configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseraConfig {
    /// Decision engine tunables
    pub engine: AbacConfig,
    pub policies: PoliciesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoliciesConfig {
    /// File or directory of JSON policy documents
    pub directory: PathBuf,
}

impl Default for PoliciesConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("policies"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` level when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl TesseraConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.policies.directory.is_relative() {
            self.policies.directory = base.join(&self.policies.directory);
        }
    }

    /// Checks engine limits and the log level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TesseraConfig::default();
        assert_eq!(config.engine.cache_ttl_secs, 300);
        assert_eq!(config.engine.cache_capacity, 10_000);
        assert_eq!(config.policies.directory, PathBuf::from("policies"));
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_path_resolution() {
        let mut config = TesseraConfig::default();
        config.resolve_paths("/srv/authz");

        assert_eq!(
            config.policies.directory,
            PathBuf::from("/srv/authz/policies")
        );
    }

    #[test]
    fn test_absolute_policy_dir_is_kept() {
        let mut config = TesseraConfig::default();
        config.policies.directory = PathBuf::from("/etc/tessera/policies");
        config.resolve_paths("/srv/authz");

        assert_eq!(
            config.policies.directory,
            PathBuf::from("/etc/tessera/policies")
        );
    }

    #[test]
    fn test_invalid_engine_limits() {
        let mut config = TesseraConfig::default();
        config.engine.cache_ttl_secs = 0;

        assert!(matches!(config.validate(), Err(ConfigError::Engine(_))));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = TesseraConfig::default();
        config.logging.level = "loud".to_string();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
