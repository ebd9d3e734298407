use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::transform::ValidationRules;

/// Where the weather API lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,

    /// Request timeout in seconds; the HTTP client default applies when unset.
    pub timeout_secs: Option<u64>,

    /// Explicit city list. When non-empty the locations endpoint is not queried.
    pub cities: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: None,
            cities: Vec::new(),
        }
    }
}

/// PostgreSQL connection parameters.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "weather_data".to_string(),
            user: "root".to_string(),
            password: "root".to_string(),
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [api]
/// base_url = "http://localhost:5000"
///
/// [database]
/// host = "localhost"
/// database = "weather_data"
/// user = "root"
/// password = "root"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub validation: ValidationRules,
}

pub const ENV_BASE_URL: &str = "WEATHER_ETL_BASE_URL";
pub const ENV_DB_HOST: &str = "WEATHER_ETL_DB_HOST";
pub const ENV_DB_PORT: &str = "WEATHER_ETL_DB_PORT";
pub const ENV_DB_NAME: &str = "WEATHER_ETL_DB_NAME";
pub const ENV_DB_USER: &str = "WEATHER_ETL_DB_USER";
pub const ENV_DB_PASSWORD: &str = "WEATHER_ETL_DB_PASSWORD";

impl Config {
    /// Load config from the default location, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    /// Load config from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-etl", "weather-etl")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Override fields from `WEATHER_ETL_*` variables.
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.api.base_url = url;
        }
        if let Some(host) = lookup(ENV_DB_HOST) {
            self.database.host = host;
        }
        if let Some(port) = lookup(ENV_DB_PORT) {
            self.database.port = port
                .parse()
                .with_context(|| format!("{ENV_DB_PORT} must be a port number, got '{port}'"))?;
        }
        if let Some(name) = lookup(ENV_DB_NAME) {
            self.database.database = name;
        }
        if let Some(user) = lookup(ENV_DB_USER) {
            self.database.user = user;
        }
        if let Some(password) = lookup(ENV_DB_PASSWORD) {
            self.database.password = password;
        }
        Ok(())
    }

    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            bail!("api.base_url must not be empty");
        }
        if self.database.host.trim().is_empty() {
            bail!("database.host must not be empty");
        }
        if self.database.database.trim().is_empty() {
            bail!("database.database must not be empty");
        }
        self.validation.check()
    }
}
