use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use crate::errors::WatchlistError;

pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";
pub const TMDB_API_KEY_ENV: &str = "TMDB_API_KEY";

// ========== Database Configuration ==========

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite file (defaults to ~/.watchlist/watchlist.db)
    pub path: Option<String>,

    /// How long a writer waits on a locked database before giving up
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

// ========== Metadata Source Configuration ==========

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// TMDB v3 API key
    #[serde(default)]
    pub api_key: String,

    /// Upper bound for every outbound metadata request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ========== Profiles Configuration ==========

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfilesConfig {
    /// Name given to the profile that inherits single-user data on migration
    #[serde(default = "default_seed_name")]
    pub seed_name: String,
}

fn default_seed_name() -> String {
    "Frank".to_string()
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            seed_name: default_seed_name(),
        }
    }
}

// ========== Root Configuration ==========

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,

    #[serde(default)]
    pub profiles: ProfilesConfig,
}

impl Config {
    /// Load configuration from the given file, or ~/.watchlist/config.toml
    pub fn load(custom_path: Option<&Path>) -> Result<Self, WatchlistError> {
        let config_path = match custom_path {
            Some(p) => p.to_path_buf(),
            None => Self::get_config_path()?,
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            Self::parse(&contents)?
        } else {
            debug!("No config file at {}, using defaults", config_path.display());
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, WatchlistError> {
        toml::from_str(contents)
            .map_err(|e| WatchlistError::Config(format!("Failed to parse config: {}", e)))
    }

    fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(DATABASE_PATH_ENV).filter(|p| !p.is_empty()) {
            self.database.path = Some(path);
        }
        if let Some(key) = lookup(TMDB_API_KEY_ENV).filter(|k| !k.is_empty()) {
            self.metadata.api_key = key;
        }
    }

    /// Directory holding the config file and the default database
    pub fn get_config_dir() -> Result<PathBuf, WatchlistError> {
        let home = std::env::var("HOME")
            .map_err(|_| WatchlistError::Config("HOME environment variable not set".to_string()))?;

        let config_dir = PathBuf::from(home).join(".watchlist");

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir)?;
        }

        Ok(config_dir)
    }

    fn get_config_path() -> Result<PathBuf, WatchlistError> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    /// Create a sample configuration file
    pub fn create_sample(custom_path: Option<&Path>) -> Result<PathBuf, WatchlistError> {
        let config_path = match custom_path {
            Some(p) => p.to_path_buf(),
            None => Self::get_config_path()?,
        };

        if config_path.exists() {
            return Err(WatchlistError::Config(format!(
                "Config file already exists at {}",
                config_path.display()
            )));
        }

        let sample = r#"# watchlist Configuration File

[database]
# SQLite file shared by every profile
# path = "/home/user/.watchlist/watchlist.db"

# Milliseconds a writer waits for a locked database
busy_timeout_ms = 5000

[metadata]
base_url = "https://api.themoviedb.org/3"

# TMDB v3 API key (the TMDB_API_KEY environment variable takes precedence)
api_key = ""

# Upper bound for every TMDB request, in seconds
timeout_secs = 10

[profiles]
# Profile that receives the rows of a single-user database when it is upgraded
seed_name = "Frank"
"#;

        std::fs::write(&config_path, sample)?;

        info!("Sample config created at: {}", config_path.display());
        Ok(config_path)
    }
}
