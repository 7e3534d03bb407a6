//! # CMS Core Configuration
//!
//! Layered configuration for the module system, schema registry and storage.
//! Values come from YAML files in a configuration directory, overridden per
//! environment and finally by `CMS__`-prefixed environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cms_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//!
//! let search_paths = &manager.config().modules.search_paths;
//! let auto_fields = manager.config().schema.allow_auto_create_fields;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/cms.yaml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CmsConfig {
    /// Deployment environment (development, test, production, ...)
    pub environment: String,

    /// Database connection settings
    pub database: DatabaseConfig,

    /// Module discovery and bootstrap settings
    pub modules: ModulesConfig,

    /// Content-type schema behaviour
    pub schema: SchemaConfig,

    /// Event bus defaults
    pub events: EventsConfig,

    /// Logging output
    pub logging: LoggingConfig,
}

impl CmsConfig {
    /// Database URL, preferring an explicit `url` over the assembled parts
    pub fn database_url(&self) -> String {
        self.database.database_url()
    }

    /// Validate cross-field constraints that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                "0",
                "at least one connection is required",
            ));
        }

        if self.modules.manifest_files.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "manifest_files",
                "modules",
            ));
        }

        if let Some(name) = self
            .modules
            .manifest_files
            .iter()
            .find(|name| name.trim().is_empty() || name.contains(['/', '\\']))
        {
            return Err(ConfigurationError::invalid_value(
                "modules.manifest_files",
                name.clone(),
                "manifest entries must be plain file names",
            ));
        }

        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigurationError::invalid_value(
                "logging.level",
                self.logging.level.clone(),
                format!("expected one of {LEVELS:?}"),
            ));
        }

        Ok(())
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the individual parts
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    /// Skip applying the core schema on connect
    pub skip_migrations: bool,
}

impl DatabaseConfig {
    pub fn database_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }

        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            username: "cms".to_string(),
            password: "cms".to_string(),
            database: "cms_development".to_string(),
            max_connections: 10,
            skip_migrations: false,
        }
    }
}

/// Module discovery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// Directories scanned for modules, lowest priority first
    pub search_paths: Vec<PathBuf>,

    /// File names recognised as a module manifest, checked in order
    pub manifest_files: Vec<String>,

    /// Modules loaded at boot when no active module records can be read
    pub bootstrap_modules: Vec<String>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            search_paths: vec![PathBuf::from("modules")],
            manifest_files: vec![
                "module.yaml".to_string(),
                "module.yml".to_string(),
                "module.json".to_string(),
            ],
            bootstrap_modules: vec!["core".to_string(), "admin".to_string()],
        }
    }
}

/// Content-type schema configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Create a `text` field the first time content carries an unknown key
    pub allow_auto_create_fields: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            allow_auto_create_fields: true,
        }
    }
}

/// Event bus configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Priority given to subscriptions that do not specify one
    pub default_priority: i32,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            default_priority: crate::events::DEFAULT_PRIORITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
