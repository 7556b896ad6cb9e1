//! Configuration module for PhotoTag.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::UserId;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for PhotoTag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub account: AccountConfig,
    pub logging: LoggingConfig,
}

/// Photo server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the photo server, without a trailing path.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Offline queue and replay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between liveness probes while mutations are pending.
    pub server_check_interval_secs: u64,
    /// Seconds between network availability polls in the daemon.
    pub network_poll_interval_secs: u64,
}

/// Network availability probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// `host:port` the probe opens a TCP connection to.
    pub probe_address: String,
    /// Connection timeout for the probe, in milliseconds.
    pub probe_timeout_ms: u64,
}

/// Local persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database holding the local store.
    pub database: PathBuf,
}

/// Account settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Overrides the identity stored under the `userId` key.
    pub user_id: Option<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/phototag/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("phototag")
            .join("config.yaml")
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Periodic server check interval as a [`Duration`].
    pub fn server_check_interval(&self) -> Duration {
        Duration::from_secs(self.sync.server_check_interval_secs)
    }

    /// Network poll interval as a [`Duration`].
    pub fn network_poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.network_poll_interval_secs)
    }

    /// Probe timeout as a [`Duration`].
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.network.probe_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://10.0.2.2:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_check_interval_secs: 10,
            network_poll_interval_secs: 5,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_address: "1.1.1.1:53".to_string(),
            probe_timeout_ms: 1500,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("phototag");
        Self {
            database: data_dir.join("phototag.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"server.base_url"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut positive = |field: &str, value: u64| {
            if value == 0 {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            }
        };

        positive("server.request_timeout_secs", self.server.request_timeout_secs);
        positive(
            "sync.server_check_interval_secs",
            self.sync.server_check_interval_secs,
        );
        positive(
            "sync.network_poll_interval_secs",
            self.sync.network_poll_interval_secs,
        );
        positive("network.probe_timeout_ms", self.network.probe_timeout_ms);

        // --- server ---
        let url = self.server.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ValidationError {
                field: "server.base_url".into(),
                message: format!("must be an http(s) URL, got {:?}", url),
            });
        } else if url.ends_with('/') {
            errors.push(ValidationError {
                field: "server.base_url".into(),
                message: "must not end with '/'".into(),
            });
        }

        // --- network ---
        if self.network.probe_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError {
                field: "network.probe_address".into(),
                message: format!(
                    "must be an ip:port pair, got {:?}",
                    self.network.probe_address
                ),
            });
        }

        // --- storage ---
        if self.storage.database.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.database".into(),
                message: "must not be empty".into(),
            });
        }

        // --- account ---
        if let Some(id) = &self.account.user_id {
            if let Err(e) = UserId::new(id.clone()) {
                errors.push(ValidationError {
                    field: "account.user_id".into(),
                    message: e.to_string(),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level {:?}, expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- server ---

    pub fn server_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.server.base_url = url.into();
        self
    }

    pub fn server_request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.server.request_timeout_secs = seconds;
        self
    }

    // --- sync ---

    pub fn sync_server_check_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.server_check_interval_secs = seconds;
        self
    }

    pub fn sync_network_poll_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.network_poll_interval_secs = seconds;
        self
    }

    // --- network ---

    pub fn network_probe_address(mut self, address: impl Into<String>) -> Self {
        self.config.network.probe_address = address.into();
        self
    }

    pub fn network_probe_timeout_ms(mut self, millis: u64) -> Self {
        self.config.network.probe_timeout_ms = millis;
        self
    }

    // --- storage ---

    pub fn storage_database(mut self, path: PathBuf) -> Self {
        self.config.storage.database = path;
        self
    }

    // --- account ---

    pub fn account_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.config.account.user_id = Some(user_id.into());
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.server.base_url, "http://10.0.2.2:8080");
        assert_eq!(cfg.server.request_timeout_secs, 30);
        assert_eq!(cfg.sync.server_check_interval_secs, 10);
        assert_eq!(cfg.sync.network_poll_interval_secs, 5);
        assert_eq!(cfg.network.probe_address, "1.1.1.1:53");
        assert_eq!(cfg.network.probe_timeout_ms, 1500);
        assert!(cfg.storage.database.ends_with("phototag/phototag.db"));
        assert!(cfg.account.user_id.is_none());
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.server_check_interval(), Duration::from_secs(10));
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
server:
  base_url: http://photos.local:9000
  request_timeout_secs: 5
sync:
  server_check_interval_secs: 3
  network_poll_interval_secs: 1
network:
  probe_address: 192.168.1.1:80
  probe_timeout_ms: 250
storage:
  database: /tmp/phototag-test.db
account:
  user_id: u1_
logging:
  level: debug
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.server.base_url, "http://photos.local:9000");
        assert_eq!(cfg.server.request_timeout_secs, 5);
        assert_eq!(cfg.sync.server_check_interval_secs, 3);
        assert_eq!(cfg.sync.network_poll_interval_secs, 1);
        assert_eq!(cfg.network.probe_address, "192.168.1.1:80");
        assert_eq!(cfg.probe_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.storage.database, PathBuf::from("/tmp/phototag-test.db"));
        assert_eq!(cfg.account.user_id.as_deref(), Some("u1_"));
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"server:\n  base_url: http://example.org\n").unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.server.base_url, "http://example.org");
        assert_eq!(cfg.server.request_timeout_secs, 30);
        assert_eq!(cfg.sync.server_check_interval_secs, 10);
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.sync.server_check_interval_secs, 10);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let cfg = ConfigBuilder::new().account_user_id("abc").build();
        cfg.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.account.user_id.as_deref(), Some("abc"));
    }

    // -- Validation --

    #[test]
    fn validate_catches_zero_intervals() {
        let mut cfg = Config::default();
        cfg.server.request_timeout_secs = 0;
        cfg.sync.server_check_interval_secs = 0;
        cfg.sync.network_poll_interval_secs = 0;
        cfg.network.probe_timeout_ms = 0;
        let errors = cfg.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"server.request_timeout_secs"));
        assert!(fields.contains(&"sync.server_check_interval_secs"));
        assert!(fields.contains(&"sync.network_poll_interval_secs"));
        assert!(fields.contains(&"network.probe_timeout_ms"));
    }

    #[test]
    fn validate_catches_bad_url() {
        let cfg = ConfigBuilder::new().server_base_url("ftp://x").build();
        assert!(cfg.validate().iter().any(|e| e.field == "server.base_url"));

        let cfg = ConfigBuilder::new().server_base_url("http://x/").build();
        assert!(cfg.validate().iter().any(|e| e.field == "server.base_url"));
    }

    #[test]
    fn validate_catches_bad_probe_address() {
        let cfg = ConfigBuilder::new().network_probe_address("nowhere").build();
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "network.probe_address"));
    }

    #[test]
    fn validate_catches_bad_user_id_and_level() {
        let cfg = ConfigBuilder::new()
            .account_user_id("")
            .logging_level("loud")
            .build();
        let errors = cfg.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors[1].to_string().starts_with("logging.level: invalid level"));
    }

    #[test]
    fn builder_validated() {
        assert!(ConfigBuilder::new().build_validated().is_ok());
        let errs = ConfigBuilder::new()
            .sync_server_check_interval_secs(0)
            .build_validated()
            .unwrap_err();
        assert_eq!(errs[0].field, "sync.server_check_interval_secs");
    }
}
