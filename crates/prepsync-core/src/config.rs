//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/prepsync/config.toml)
//! 3. Environment variables (PREPSYNC_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable prefix
const ENV_PREFIX: &str = "PREPSYNC";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the sync server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Directory for data storage (SQLite db)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Minimum preparation notice before a slot may be offered, in minutes
    #[serde(default = "default_lead_time")]
    pub lead_time_minutes: i64,

    /// First pickup slot of the day (`HH:MM`)
    #[serde(default = "default_first_slot")]
    pub first_slot: String,

    /// Last pickup slot of the day (`HH:MM`)
    #[serde(default = "default_last_slot")]
    pub last_slot: String,

    /// Minutes between consecutive slots
    #[serde(default = "default_slot_interval")]
    pub slot_interval_minutes: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_dir: default_data_dir(),
            lead_time_minutes: default_lead_time(),
            first_slot: default_first_slot(),
            last_slot: default_last_slot(),
            slot_interval_minutes: default_slot_interval(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
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
        if let Ok(val) = std::env::var(format!("{}_BIND_ADDR", ENV_PREFIX)) {
            self.bind_addr = val;
        }

        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_LEAD_TIME_MINUTES", ENV_PREFIX)) {
            if let Ok(minutes) = val.parse() {
                self.lead_time_minutes = minutes;
            }
        }
    }

    /// Ensure the data directory exists
    pub fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file location
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific path
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
    /// Can be overridden with the PREPSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("prepsync")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("prepsync.db")
    }

    /// Generate the day's slot labels from first slot to last slot at the
    /// configured interval
    pub fn day_labels(&self) -> Result<Vec<String>> {
        let first = NaiveTime::parse_from_str(&self.first_slot, "%H:%M")
            .with_context(|| format!("Invalid first_slot: {}", self.first_slot))?;
        let last = NaiveTime::parse_from_str(&self.last_slot, "%H:%M")
            .with_context(|| format!("Invalid last_slot: {}", self.last_slot))?;
        if self.slot_interval_minutes == 0 {
            anyhow::bail!("slot_interval_minutes must be greater than zero");
        }
        if last < first {
            anyhow::bail!("last_slot must not be earlier than first_slot");
        }

        let step = chrono::Duration::minutes(self.slot_interval_minutes as i64);
        let mut labels = Vec::new();
        let mut current = first;
        while current <= last {
            labels.push(current.format("%H:%M").to_string());
            let next = current + step;
            // NaiveTime arithmetic wraps at midnight; stop instead of looping.
            if next <= current {
                break;
            }
            current = next;
        }
        Ok(labels)
    }
}

/// Get the default bind address
fn default_bind_addr() -> String {
    "127.0.0.1:8090".to_string()
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("prepsync")
}

fn default_lead_time() -> i64 {
    60
}

fn default_first_slot() -> String {
    "12:00".to_string()
}

fn default_last_slot() -> String {
    "21:30".to_string()
}

fn default_slot_interval() -> u32 {
    15
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap();
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "PREPSYNC_BIND_ADDR",
        "PREPSYNC_DATA_DIR",
        "PREPSYNC_LEAD_TIME_MINUTES",
    ];

    #[test]
    fn test_default_config() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8090");
        assert_eq!(config.lead_time_minutes, 60);
        assert!(config.data_dir.ends_with("prepsync"));
        assert!(config.sqlite_path().ends_with("prepsync.db"));
    }

    #[test]
    fn test_env_overrides() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("PREPSYNC_BIND_ADDR", "0.0.0.0:9000");
        env::set_var("PREPSYNC_DATA_DIR", "/tmp/prepsync-test");
        env::set_var("PREPSYNC_LEAD_TIME_MINUTES", "30");
        config.apply_env_overrides();

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/prepsync-test"));
        assert_eq!(config.lead_time_minutes, 30);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            bind_addr = "0.0.0.0:8091"
            lead_time_minutes = 45
            first_slot = "11:30"
            last_slot = "14:00"
            slot_interval_minutes = 30
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8091");
        assert_eq!(config.lead_time_minutes, 45);
        assert_eq!(config.slot_interval_minutes, 30);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8090");
    }

    #[test]
    fn test_day_labels() {
        let config = Config {
            first_slot: "12:00".to_string(),
            last_slot: "13:00".to_string(),
            slot_interval_minutes: 15,
            ..Config::default()
        };

        assert_eq!(
            config.day_labels().unwrap(),
            vec!["12:00", "12:15", "12:30", "12:45", "13:00"]
        );
    }

    #[test]
    fn test_day_labels_rejects_bad_ranges() {
        let backwards = Config {
            first_slot: "14:00".to_string(),
            last_slot: "12:00".to_string(),
            ..Config::default()
        };
        assert!(backwards.day_labels().is_err());

        let unparseable = Config {
            first_slot: "noon".to_string(),
            ..Config::default()
        };
        assert!(unparseable.day_labels().is_err());

        let zero_step = Config {
            slot_interval_minutes: 0,
            ..Config::default()
        };
        assert!(zero_step.day_labels().is_err());
    }
}
