//! # Configuration
//!
//! Optional `traza.toml` file. Every section and key may be omitted.
//!
//! ```toml
//! [storage]
//! database = "traza.db"
//! backend = "redb"
//! # Catalog loaded at startup by the memory backend
//! catalog = "curriculum.json"
//!
//! [logging]
//! format = "json"
//! filter = "traza=debug"
//! ```
//!
//! Command-line flags take precedence over the file, which takes precedence
//! over the built-in defaults.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use traza_core::TrazaError;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "traza.toml";

/// Default database path.
pub const DEFAULT_DATABASE: &str = "traza.db";

/// Default log filter when neither `RUST_LOG` nor the file sets one.
pub const DEFAULT_LOG_FILTER: &str = "traza=info,traza_core=info";

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Disk-backed redb database.
    #[default]
    Redb,
    /// Volatile in-memory store; nothing survives the process.
    Memory,
}

impl Backend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::Memory => "memory",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse the `TRAZA_LOG_FORMAT` value; anything but "json" is text.
    #[must_use]
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database: PathBuf,
    pub backend: Backend,
    pub catalog: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            backend: Backend::default(),
            catalog: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse a configuration document.
    pub fn parse(text: &str) -> Result<Self, TrazaError> {
        toml::from_str(text).map_err(|e| TrazaError::SerializationError(format!("Config: {}", e)))
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, TrazaError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TrazaError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// Load an explicit config file, or `traza.toml` if present, or defaults.
    ///
    /// A missing explicit file is an error; a missing default file is not.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, TrazaError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
