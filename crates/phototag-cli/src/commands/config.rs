//! Config command - View and manage PhotoTag configuration
//!
//! Provides the `phototag config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use phototag_core::config::Config;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

/// Keys accepted by `config set`, with a short description
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("server.base_url", "Photo server URL"),
    ("server.request_timeout_secs", "Per-request timeout"),
    ("sync.server_check_interval_secs", "Seconds between server checks"),
    ("sync.network_poll_interval_secs", "Seconds between network polls"),
    ("network.probe_address", "ip:port used to detect the network"),
    ("network.probe_timeout_ms", "Network probe timeout"),
    ("storage.database", "SQLite database path"),
    ("account.user_id", "User id, or 'none' to use the stored one"),
    ("logging.level", "trace|debug|info|warn|error"),
];

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "server.base_url")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config_path, format),
            ConfigCommand::Set { key, value } => execute_set(config_path, key, value, format),
            ConfigCommand::Validate => execute_validate(config_path, format),
        }
    }
}

fn execute_show(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config = Config::load_or_default(config_path);

    info!(config_path = %config_path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        formatter.info("");
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_set(config_path: &Path, key: &str, value: &str, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let mut config = Config::load_or_default(config_path);

    info!(key = %key, value = %value, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "error": e.to_string(),
            }));
        } else {
            formatter.error(&format!("Failed to set '{}': {}", key, e));
            formatter.info("");
            formatter.info("Supported keys:");
            for (name, help) in SUPPORTED_KEYS {
                formatter.info(&format!("  {:<34}- {}", name, help));
            }
        }
        return Ok(());
    }

    let errors: Vec<String> = config.validate().iter().map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "errors": errors,
            }));
        } else {
            formatter.error(&format!(
                "Invalid value for '{}': {}",
                key,
                errors.join("; ")
            ));
        }
        return Ok(());
    }

    config
        .save(config_path)
        .context("Failed to write configuration file")?;

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": value,
            "config_path": config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {} = {}", key, value));
        formatter.info(&format!("Saved to {}", config_path.display()));
    }
    Ok(())
}

fn execute_validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    let config = match Config::load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            let message = if config_path.exists() {
                format!("Failed to parse configuration: {}", e)
            } else {
                "Configuration file not found. Using defaults.".to_string()
            };
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [message],
                }));
            } else {
                formatter.error(&message);
                formatter.info(&format!("File: {}", config_path.display()));
            }
            return Ok(());
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");
    let errors = config.validate();

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }
    Ok(())
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let number = |field: &str| -> Result<u64> {
        value
            .parse::<u64>()
            .with_context(|| format!("Expected a positive integer for {}", field))
    };

    match key {
        // --- server ---
        "server.base_url" => config.server.base_url = value.trim_end_matches('/').to_string(),
        "server.request_timeout_secs" => config.server.request_timeout_secs = number(key)?,

        // --- sync ---
        "sync.server_check_interval_secs" => {
            config.sync.server_check_interval_secs = number(key)?
        }
        "sync.network_poll_interval_secs" => {
            config.sync.network_poll_interval_secs = number(key)?
        }

        // --- network ---
        "network.probe_address" => config.network.probe_address = value.to_string(),
        "network.probe_timeout_ms" => config.network.probe_timeout_ms = number(key)?,

        // --- storage ---
        "storage.database" => config.storage.database = PathBuf::from(value),

        // --- account ---
        "account.user_id" => {
            config.account.user_id = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.to_string())
            };
        }

        // --- logging ---
        "logging.level" => config.logging.level = value.to_string(),

        _ => anyhow::bail!("Unknown configuration key: '{}'", key),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_server_base_url_strips_slash() {
        let mut config = Config::default();
        apply_config_value(&mut config, "server.base_url", "http://photos.local:8080/").unwrap();
        assert_eq!(config.server.base_url, "http://photos.local:8080");
    }

    #[test]
    fn test_apply_numeric_keys() {
        let mut config = Config::default();
        apply_config_value(&mut config, "sync.server_check_interval_secs", "30").unwrap();
        apply_config_value(&mut config, "network.probe_timeout_ms", "250").unwrap();
        assert_eq!(config.sync.server_check_interval_secs, 30);
        assert_eq!(config.network.probe_timeout_ms, 250);
    }

    #[test]
    fn test_apply_numeric_rejects_text() {
        let mut config = Config::default();
        let err = apply_config_value(&mut config, "server.request_timeout_secs", "soon")
            .unwrap_err();
        assert!(err.to_string().contains("server.request_timeout_secs"));
    }

    #[test]
    fn test_apply_user_id_none_clears() {
        let mut config = Config::default();
        apply_config_value(&mut config, "account.user_id", "u1_").unwrap();
        assert_eq!(config.account.user_id.as_deref(), Some("u1_"));
        apply_config_value(&mut config, "account.user_id", "none").unwrap();
        assert!(config.account.user_id.is_none());
    }

    #[test]
    fn test_apply_unknown_key() {
        let mut config = Config::default();
        assert!(apply_config_value(&mut config, "sync.root", "/tmp").is_err());
    }

    #[test]
    fn test_every_supported_key_is_settable() {
        let samples = [
            ("server.base_url", "http://localhost:8080"),
            ("server.request_timeout_secs", "5"),
            ("sync.server_check_interval_secs", "5"),
            ("sync.network_poll_interval_secs", "5"),
            ("network.probe_address", "127.0.0.1:53"),
            ("network.probe_timeout_ms", "100"),
            ("storage.database", "/tmp/phototag.db"),
            ("account.user_id", "u1_"),
            ("logging.level", "debug"),
        ];
        for (key, _) in SUPPORTED_KEYS {
            let value = samples
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| *v)
                .unwrap();
            let mut config = Config::default();
            apply_config_value(&mut config, key, value).unwrap();
            assert!(config.validate().is_empty(), "{} made config invalid", key);
        }
    }

    #[test]
    fn test_set_then_show_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phototag").join("config.yaml");
        execute_set(&path, "logging.level", "debug", OutputFormat::Json).unwrap();
        assert_eq!(Config::load(&path).unwrap().logging.level, "debug");

        // An invalid value is not saved
        execute_set(&path, "logging.level", "loud", OutputFormat::Json).unwrap();
        assert_eq!(Config::load(&path).unwrap().logging.level, "debug");
    }
}
