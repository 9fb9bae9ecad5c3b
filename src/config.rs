use std::path::Path;

use config::{Config, ConfigBuilder, Environment, File};
use config::builder::DefaultState;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::validation::InputValidator;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage settings
    pub database: DatabaseConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Connection and pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `sqlite:<path>`, `sqlite://<path>` or `:memory:`
    pub url: String,
    /// Maximum pooled connections (forced to 1 for in-memory stores)
    pub max_connections: u32,
    /// How long to wait for a pooled connection
    pub connection_timeout_secs: u32,
    /// SQLite busy timeout applied to every connection
    pub busy_timeout_ms: u32,
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Optional JSON log file (rotated daily)
    pub file_path: Option<String>,
    /// Console format: "text" or "json"
    pub format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/supportal.db".to_string(),
            max_connections: 10,
            connection_timeout_secs: 30,
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    /// Default settings pointing at `url`
    #[must_use]
    pub fn with_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    ///
    /// Defaults, then `config/default`, `config/local` and `config` files in
    /// any format the `config` crate understands, then `SUPPORTAL_*`
    /// environment variables (`SUPPORTAL_DATABASE__URL`).
    pub fn load() -> Result<Self> {
        let config = Self::builder_with_defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("SUPPORTAL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::finish(config)
    }

    /// Load configuration from a single file layered over the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = Self::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?;

        Self::finish(config)
    }

    fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("database.url", defaults.database.url)?
            .set_default(
                "database.max_connections",
                i64::from(defaults.database.max_connections),
            )?
            .set_default(
                "database.connection_timeout_secs",
                i64::from(defaults.database.connection_timeout_secs),
            )?
            .set_default(
                "database.busy_timeout_ms",
                i64::from(defaults.database.busy_timeout_ms),
            )?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?;

        if let Some(file_path) = defaults.logging.file_path {
            builder = builder.set_default("logging.file_path", file_path)?;
        }

        Ok(builder)
    }

    fn finish(config: Config) -> Result<Self> {
        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate database config
        InputValidator::validate_database_url(&self.database.url)?;
        if self.database.max_connections == 0 {
            return Err(StoreError::InvalidConfig(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        if self.database.connection_timeout_secs == 0 {
            return Err(StoreError::InvalidConfig(
                "connection_timeout_secs must be greater than 0".to_string(),
            ));
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(StoreError::InvalidConfig(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            )));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(StoreError::InvalidConfig(format!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format, valid_formats
            )));
        }

        Ok(())
    }

    /// Get database URL from environment or config
    #[must_use]
    pub fn get_database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.database.url.clone())
    }
}
