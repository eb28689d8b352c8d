// ABOUTME: Configuration management for the SQL web console backend
// ABOUTME: Handles server connection profiles and pool tuning in a JSON file

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Overrides the config file location
pub const CONFIG_PATH_ENV: &str = "SQLWEB_CONFIG";
/// Overrides the password of the active profile
pub const PASSWORD_ENV: &str = "SQLWEB_PASSWORD";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Config directory not found")]
    NoDirFound,
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),
    #[error("Cannot remove the last profile")]
    LastProfile,
}

/// Connection profile for a SQL Server instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_true")]
    pub trust_certificate: bool,
}

fn default_port() -> u16 {
    1433
}

fn default_true() -> bool {
    true
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            host: "localhost".to_string(),
            port: 1433,
            username: "sa".to_string(),
            password: String::new(),
            trust_certificate: true,
        }
    }
}

/// Pool bounds and statement timeout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolSettings {
    /// Connections opened when the pool is built
    #[serde(default = "default_initial_size")]
    pub initial_size: u32,
    #[serde(default = "default_min_idle")]
    pub min_idle: u32,
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    /// How long a checkout may wait for a free connection
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    /// 0 disables the statement timeout
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

fn default_initial_size() -> u32 {
    2
}

fn default_min_idle() -> u32 {
    1
}

fn default_max_size() -> u32 {
    20
}

fn default_connection_timeout_ms() -> u64 {
    10_000
}

fn default_statement_timeout_ms() -> u64 {
    30_000
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            initial_size: default_initial_size(),
            min_idle: default_min_idle(),
            max_size: default_max_size(),
            connection_timeout_ms: default_connection_timeout_ms(),
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }
}

impl PoolSettings {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// `None` when `statement_timeout_ms` is 0
    pub fn statement_timeout(&self) -> Option<Duration> {
        match self.statement_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Clamp the bounds so that `max_size >= 1` and neither `initial_size`
    /// nor `min_idle` exceeds `max_size`
    pub fn normalized(&self) -> Self {
        let max_size = self.max_size.max(1);
        let initial_size = self.initial_size.min(max_size);
        Self {
            initial_size,
            min_idle: self.min_idle.min(max_size),
            max_size,
            connection_timeout_ms: self.connection_timeout_ms,
            statement_timeout_ms: self.statement_timeout_ms,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_active_profile")]
    pub active_profile: String,
    #[serde(default)]
    pub profiles: HashMap<String, ConnectionProfile>,
    #[serde(default)]
    pub pool: PoolSettings,
}

fn default_version() -> u32 {
    1
}

fn default_active_profile() -> String {
    "default".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert("default".to_string(), ConnectionProfile::default());

        Self {
            version: 1,
            active_profile: "default".to_string(),
            profiles,
            pool: PoolSettings::default(),
        }
    }
}

impl AppConfig {
    /// Get the config file path, honoring `SQLWEB_CONFIG`
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoDirFound)?;
        Ok(config_dir.join("sqlweb").join("config.json"))
    }

    /// Load config from the default location, creating it if missing
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load config from a file, or write and return the default if it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            log::info!("Created default config at {}", path.display());
            return Ok(config);
        }

        let contents = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the active connection profile
    pub fn active_profile(&self) -> Result<&ConnectionProfile, ConfigError> {
        self.profiles
            .get(&self.active_profile)
            .ok_or_else(|| ConfigError::ProfileNotFound(self.active_profile.clone()))
    }

    /// Active profile with `SQLWEB_PASSWORD` applied when set
    pub fn resolved_profile(&self) -> Result<ConnectionProfile, ConfigError> {
        let mut profile = self.active_profile()?.clone();
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            profile.password = password;
        }
        Ok(profile)
    }

    /// Add or update a profile
    pub fn set_profile(&mut self, key: String, profile: ConnectionProfile) {
        self.profiles.insert(key, profile);
    }

    /// Switch the active profile
    pub fn select_profile(&mut self, key: &str) -> Result<(), ConfigError> {
        if !self.profiles.contains_key(key) {
            return Err(ConfigError::ProfileNotFound(key.to_string()));
        }
        self.active_profile = key.to_string();
        Ok(())
    }

    /// Remove a profile (cannot remove if it's the only one)
    pub fn remove_profile(&mut self, key: &str) -> Result<(), ConfigError> {
        if !self.profiles.contains_key(key) {
            return Err(ConfigError::ProfileNotFound(key.to_string()));
        }
        if self.profiles.len() <= 1 {
            return Err(ConfigError::LastProfile);
        }
        self.profiles.remove(key);

        if self.active_profile == key {
            let mut keys: Vec<&String> = self.profiles.keys().collect();
            keys.sort();
            if let Some(first_key) = keys.first() {
                self.active_profile = (*first_key).clone();
            }
        }
        Ok(())
    }
}
