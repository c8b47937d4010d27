//! Configuration management for romhacks.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "romhacks";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "romhacks.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `ROMHACKS_`, sections split on `__`)
/// 2. TOML config file at `~/.config/romhacks/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Admin access configuration.
    pub admin: AdminConfig,
    /// Privacy configuration.
    pub privacy: PrivacyConfig,
    /// Rate limiting for public write endpoints.
    pub rate_limit: RateLimitConfig,
    /// Monthly archive configuration.
    pub archive: ArchiveConfig,
    /// Submission intake configuration.
    pub submissions: SubmissionConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind: String,
    /// Directory served under `/static`, if any.
    pub static_dir: Option<PathBuf>,
    /// Use the first `X-Forwarded-For` address as the client IP.
    ///
    /// Only enable this behind a reverse proxy that sets the header, since
    /// clients can put anything in it.
    pub trust_forwarded_for: bool,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/romhacks/romhacks.db`
    pub database_path: Option<PathBuf>,
}

/// Admin access configuration.
///
/// Admin routes are disabled unless both `username` and `password` are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Admin login name.
    pub username: Option<String>,
    /// Admin password.
    pub password: Option<String>,
    /// Secret used to sign session cookies. Sessions do not survive a
    /// restart when this is unset.
    pub session_secret: Option<String>,
    /// How long an admin session stays valid, in hours.
    pub session_ttl_hours: u32,
    /// Mark the session cookie `Secure`.
    pub secure_cookie: bool,
}

/// Privacy-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// Salt mixed into client IP and user agent hashes.
    pub hash_salt: String,
}

/// Token bucket settings for submissions and feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,
    /// Burst size per client.
    pub capacity: f64,
    /// Tokens added back per minute.
    pub refill_per_minute: f64,
}

/// Monthly popularity archive configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Run the background archive task while serving.
    pub enabled: bool,
    /// How many entries per kind to keep for each month.
    pub top_n: usize,
    /// Interval between archive checks, in hours.
    pub check_interval_hours: u32,
}

/// Submission intake configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Maximum length of any single text field.
    pub max_field_length: usize,
    /// Maximum number of screenshots per submission.
    pub max_screenshots: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            static_dir: None,
            trust_forwarded_for: false,
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            session_secret: None,
            session_ttl_hours: 12,
            secure_cookie: false,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 5.0,
            refill_per_minute: 2.0,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_n: 20,
            check_interval_hours: 6,
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_field_length: 10_000,
            max_screenshots: 12,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("ROMHACKS_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        if self.admin.username.is_some() != self.admin.password.is_some() {
            return Err(Error::ConfigValidation {
                message: "admin.username and admin.password must be set together".to_string(),
            });
        }

        if self.admin.session_ttl_hours == 0 {
            return Err(Error::ConfigValidation {
                message: "admin.session_ttl_hours must be greater than 0".to_string(),
            });
        }

        if self.rate_limit.enabled
            && (self.rate_limit.capacity < 1.0 || self.rate_limit.refill_per_minute <= 0.0)
        {
            return Err(Error::ConfigValidation {
                message: format!(
                    "rate_limit.capacity ({}) must be at least 1 and refill_per_minute ({}) positive",
                    self.rate_limit.capacity, self.rate_limit.refill_per_minute
                ),
            });
        }

        if self.archive.top_n == 0 {
            return Err(Error::ConfigValidation {
                message: "archive.top_n must be greater than 0".to_string(),
            });
        }

        if self.archive.check_interval_hours == 0 {
            return Err(Error::ConfigValidation {
                message: "archive.check_interval_hours must be greater than 0".to_string(),
            });
        }

        if self.submissions.max_field_length == 0 {
            return Err(Error::ConfigValidation {
                message: "submissions.max_field_length must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Parse the configured bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if `server.bind` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|e| Error::ConfigValidation {
                message: format!("invalid server.bind '{}': {e}", self.server.bind),
            })
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Whether admin credentials are configured.
    #[must_use]
    pub fn admin_enabled(&self) -> bool {
        self.admin.username.is_some() && self.admin.password.is_some()
    }

    /// Get the admin session lifetime as a Duration.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.admin.session_ttl_hours) * 60 * 60)
    }

    /// Get the archive check interval as a Duration.
    #[must_use]
    pub fn archive_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.archive.check_interval_hours) * 60 * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind, "127.0.0.1:5000");
        assert!(!config.server.trust_forwarded_for);
        assert!(config.rate_limit.enabled);
        assert!(config.archive.enabled);
        assert!(!config.admin_enabled());
    }

    #[test]
    fn test_default_archive_config() {
        let archive = ArchiveConfig::default();

        assert_eq!(archive.top_n, 20);
        assert_eq!(archive.check_interval_hours, 6);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_bind() {
        let mut config = Config::default();
        config.server.bind = "not an address".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("server.bind"));
    }

    #[test]
    fn test_validate_half_configured_admin() {
        let mut config = Config::default();
        config.admin.username = Some("admin".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("admin.username"));
    }

    #[test]
    fn test_validate_zero_top_n() {
        let mut config = Config::default();
        config.archive.top_n = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("top_n"));
    }

    #[test]
    fn test_validate_rate_limit_ignored_when_disabled() {
        let mut config = Config::default();
        config.rate_limit.enabled = false;
        config.rate_limit.capacity = 0.0;

        assert!(config.validate().is_ok());

        config.rate_limit.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_admin_enabled() {
        let mut config = Config::default();
        config.admin.username = Some("admin".to_string());
        config.admin.password = Some("hunter2".to_string());

        assert!(config.admin_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        assert!(config.database_path().to_string_lossy().contains("romhacks.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/srv/romhacks/requests.db"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/srv/romhacks/requests.db")
        );
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.session_ttl(), Duration::from_secs(12 * 60 * 60));
        assert_eq!(config.archive_interval(), Duration::from_secs(6 * 60 * 60));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("romhacks"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind = "0.0.0.0:8080"

[archive]
top_n = 10

[admin]
username = "peter"
password = "secret"
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.archive.top_n, 10);
        assert!(config.admin_enabled());
        assert_eq!(config.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn test_rate_limit_config_deserialize() {
        let json = r#"{"capacity": 10.0}"#;
        let rate: RateLimitConfig = serde_json::from_str(json).unwrap();
        assert!((rate.capacity - 10.0).abs() < f64::EPSILON);
        assert!(rate.enabled);
    }
}
