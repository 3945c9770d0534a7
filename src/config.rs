//! Application configuration.
//!
//! Loaded from a TOML file, then overridden from the environment. Nothing
//! here is baked into the binary beyond the defaults below.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::mapping::{validate_identifier, NameMapper};
use crate::error::{CrudError, Result};

// =============================================================================
// Constants
// =============================================================================

/// Default database location, relative to the working directory.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://crud-demo.db";

/// Default connection pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Environment variable overriding `database.url`.
pub const ENV_DB_URL: &str = "CRUD_DEMO_DB_URL";

/// Environment variable overriding `database.max_connections`.
pub const ENV_MAX_CONNECTIONS: &str = "CRUD_DEMO_MAX_CONNECTIONS";

/// Environment variable overriding `mapping.naming`.
pub const ENV_NAMING: &str = "CRUD_DEMO_NAMING";

fn default_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_level() -> String {
    "info".to_string()
}

// =============================================================================
// Database Configuration
// =============================================================================

/// Supported database engines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    #[default]
    Sqlite,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Engine (only `sqlite`).
    #[serde(default)]
    pub kind: DatabaseKind,

    /// Connection URL, e.g. `sqlite://demo.db` or `sqlite::memory:`.
    #[serde(default = "default_url")]
    pub url: String,

    /// Connection pool size (default: 5).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Driver parameters, applied as pragmas on every connection.
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Log every SQL statement at debug level.
    #[serde(default)]
    pub log_statements: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            kind: DatabaseKind::Sqlite,
            url: default_url(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            params: BTreeMap::new(),
            log_statements: false,
        }
    }
}

// =============================================================================
// Mapping / Logging Configuration
// =============================================================================

/// Object-to-table mapping options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Field-to-column naming convention (default: `gonic`).
    #[serde(default)]
    pub naming: NameMapper,
}

/// Logging options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub mapping: MappingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// `<config_dir>/crud-demo/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("crud-demo").join("config.toml"))
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| CrudError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `CrudError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from an explicit path, or from the default path if it exists.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load(path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (ENV > config file).
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_DB_URL) {
            self.database.url = url;
        }
        if let Some(raw) = lookup(ENV_MAX_CONNECTIONS) {
            self.database.max_connections = raw.trim().parse().map_err(|_| {
                CrudError::Config(format!("{} must be a positive integer, got '{}'", ENV_MAX_CONNECTIONS, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_NAMING) {
            self.mapping.naming = raw.parse()?;
        }
        self.validate()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `CrudError::Config` if any field is invalid.
    pub fn validate(&self) -> Result<()> {
        let url = self.database.url.trim();
        if url.is_empty() {
            return Err(CrudError::Config("database url must not be empty".to_string()));
        }
        match self.database.kind {
            DatabaseKind::Sqlite => {
                if !url.starts_with("sqlite:") {
                    return Err(CrudError::Config(format!(
                        "database url '{}' is not a sqlite url",
                        url
                    )));
                }
            }
        }

        if self.database.max_connections == 0 {
            return Err(CrudError::Config(
                "database max_connections must be positive".to_string(),
            ));
        }

        for key in self.database.params.keys() {
            validate_identifier(key)
                .map_err(|_| CrudError::Config(format!("invalid driver parameter name '{}'", key)))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.url, DEFAULT_DATABASE_URL);
        assert_eq!(config.mapping.naming, NameMapper::Gonic);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_full_document() {
        let config = AppConfig::from_toml_str(
            r#"
            [database]
            kind = "sqlite"
            url = "sqlite::memory:"
            max_connections = 1

            [database.params]
            encoding = "UTF-8"

            [mapping]
            naming = "snake"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.max_connections, 1);
        assert_eq!(config.database.params.get("encoding").unwrap(), "UTF-8");
        assert_eq!(config.mapping.naming, NameMapper::Snake);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_unsupported_kind_rejected() {
        let result = AppConfig::from_toml_str("[database]\nkind = \"mysql\"\n");
        assert!(matches!(result, Err(CrudError::Config(_))));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.database.url = "mysql://user@host/demo".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config
            .database
            .params
            .insert("charset;".to_string(), "utf8".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DB_URL, "sqlite::memory:"),
            (ENV_MAX_CONNECTIONS, "2"),
            (ENV_NAMING, "same"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.mapping.naming, NameMapper::Same);
    }

    #[test]
    fn test_bad_env_override() {
        let mut config = AppConfig::default();
        let result = config.apply_env_from(|key| {
            (key == ENV_MAX_CONNECTIONS).then(|| "many".to_string())
        });
        assert!(matches!(result, Err(CrudError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[database]\nurl = \"sqlite://other.db\"").unwrap();

        let config = AppConfig::load_or_default(Some(file.path())).unwrap();
        assert_eq!(config.database.url, "sqlite://other.db");
        assert_eq!(config.database.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load_or_default(Some(dir.path().join("absent.toml").as_path()));
        assert!(matches!(result, Err(CrudError::Io(_))));
    }
}
