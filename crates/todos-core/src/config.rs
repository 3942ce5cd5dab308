//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/todos/config.toml)
//! 3. Environment variables (TODOS_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable prefix
const ENV_PREFIX: &str = "TODOS";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the hosted store (e.g. https://xyz.supabase.co)
    #[serde(default)]
    pub url: Option<String>,

    /// Anonymous API key sent with every request
    #[serde(default)]
    pub anon_key: Option<String>,

    /// Table holding the todo records
    #[serde(default = "default_table")]
    pub table: String,

    /// Realtime channel name
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Seconds between realtime heartbeats
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Directory for local files (debug log)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log file used by the TUI (defaults to {data_dir}/debug.log)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            table: default_table(),
            channel: default_channel(),
            heartbeat_secs: default_heartbeat_secs(),
            data_dir: default_data_dir(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (TODOS_URL, TODOS_ANON_KEY, TODOS_TABLE, ...)
    /// 2. Config file (~/.config/todos/config.toml or TODOS_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // TODOS_URL
        if let Ok(val) = std::env::var(format!("{}_URL", ENV_PREFIX)) {
            self.url = if val.is_empty() { None } else { Some(val) };
        }

        // TODOS_ANON_KEY
        if let Ok(val) = std::env::var(format!("{}_ANON_KEY", ENV_PREFIX)) {
            self.anon_key = if val.is_empty() { None } else { Some(val) };
        }

        // TODOS_TABLE
        if let Ok(val) = std::env::var(format!("{}_TABLE", ENV_PREFIX)) {
            if !val.is_empty() {
                self.table = val;
            }
        }

        // TODOS_CHANNEL
        if let Ok(val) = std::env::var(format!("{}_CHANNEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.channel = val;
            }
        }

        // TODOS_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }
    }

    /// Connection credentials for the hosted store
    ///
    /// Fails with setup instructions when either value is missing.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let Some(url) = self.url.as_deref() else {
            bail!(
                "Store URL not configured. Set it with:\n  \
                 todos config set url https://your-project.supabase.co"
            );
        };
        let Some(key) = self.anon_key.as_deref() else {
            bail!(
                "API key not configured. Set it with:\n  \
                 todos config set anon_key <key>"
            );
        };
        Ok((url, key))
    }

    /// Set a configuration value by key name
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "url" => self.url = optional(value),
            "anon_key" => self.anon_key = optional(value),
            "table" => {
                if value.is_empty() {
                    bail!("table cannot be empty");
                }
                self.table = value.to_string();
            }
            "channel" => {
                if value.is_empty() {
                    bail!("channel cannot be empty");
                }
                self.channel = value.to_string();
            }
            "heartbeat_secs" => {
                self.heartbeat_secs = value
                    .parse()
                    .context("Invalid value for heartbeat_secs. Use a whole number of seconds.")?;
            }
            "data_dir" => self.data_dir = PathBuf::from(value),
            "log_file" => self.log_file = optional(value).map(PathBuf::from),
            _ => {
                bail!(
                    "Unknown configuration key: '{}'\n\
                     Valid keys: url, anon_key, table, channel, heartbeat_secs, data_dir, log_file",
                    key
                );
            }
        }
        Ok(())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with TODOS_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("todos")
            .join("config.toml")
    }

    /// Path of the debug log, creating the data directory if needed
    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.log_file {
            return Ok(path.clone());
        }
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(self.data_dir.join("debug.log"))
    }
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

fn default_table() -> String {
    "todos".to_string()
}

fn default_channel() -> String {
    "any".to_string()
}

fn default_heartbeat_secs() -> u64 {
    25
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("todos")
}
