//! Relay configuration: optional TOML file plus env overrides.
//!
//! Every field has a sensible default, so a missing config file is not an
//! error — the relay is routinely run with nothing but env vars.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;

use crate::queue::{DEFAULT_BATCH_SIZE, DEFAULT_RETENTION_MS};

// ---------------------------------------------------------------------------
// Config structure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP listen port. `WEB_PORT` env var wins over the file.
    pub port: u16,
    /// Max commands handed to the device per poll.
    pub batch_size: usize,
    /// Seconds acknowledged commands are retained before the sweep.
    pub retention_secs: u64,
    /// LCD message ring capacity.
    pub message_ring: usize,
    /// Telemetry history ring capacity.
    pub history_cap: usize,
    /// Base address of the device's own file server (archive proxying,
    /// not used by the core relay loop). `ESP32_IP` env var wins.
    pub device_base: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            batch_size: DEFAULT_BATCH_SIZE,
            retention_secs: (DEFAULT_RETENTION_MS / 1000) as u64,
            message_ring: 5,
            history_cap: 1000,
            device_base: "http://192.168.4.1".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn retention_ms(&self) -> i64 {
        self.retention_secs as i64 * 1000
    }

    /// Validate all fields, reporting every violation at once rather than
    /// bailing on the first.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.batch_size == 0 {
            errors.push("batch_size must be at least 1".to_string());
        }
        if self.message_ring == 0 {
            errors.push("message_ring must be at least 1".to_string());
        }
        if self.history_cap == 0 {
            errors.push("history_cap must be at least 1".to_string());
        }
        if self.retention_secs == 0 {
            errors.push("retention_secs must be at least 1".to_string());
        }
        if self.device_base.trim().is_empty() {
            errors.push("device_base is empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load config from `path` if it exists, fall back to defaults otherwise,
/// then apply env overrides and validate.
pub fn load(path: &str) -> Result<RelayConfig> {
    let mut cfg = if Path::new(path).exists() {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{path}'"))?;
        toml::from_str(&text).with_context(|| format!("failed to parse config file '{path}'"))?
    } else {
        tracing::info!(path, "no config file, using defaults");
        RelayConfig::default()
    };

    if let Some(port) = env::var("WEB_PORT").ok().and_then(|s| s.parse().ok()) {
        cfg.port = port;
    }
    if let Ok(ip) = env::var("ESP32_IP") {
        cfg.device_base = format!("http://{ip}");
    }

    cfg.validate()?;
    Ok(cfg)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RelayConfig::default().validate().is_ok());
    }

    #[test]
    fn defaults_match_wire_contract() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.batch_size, 5);
        assert_eq!(cfg.retention_ms(), 5 * 60 * 1000);
        assert_eq!(cfg.message_ring, 5);
        assert_eq!(cfg.history_cap, 1000);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg: RelayConfig = toml::from_str("port = 9090\nbatch_size = 3").unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.batch_size, 3);
        assert_eq!(cfg.history_cap, 1000);
    }

    #[test]
    fn parses_empty_toml_as_defaults() {
        let cfg: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn validate_collects_all_errors() {
        let cfg = RelayConfig {
            batch_size: 0,
            message_ring: 0,
            retention_secs: 0,
            ..RelayConfig::default()
        };
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("3 errors"), "got: {err}");
        assert!(err.contains("batch_size"));
        assert!(err.contains("message_ring"));
        assert!(err.contains("retention_secs"));
    }

    #[test]
    fn validate_rejects_empty_device_base() {
        let cfg = RelayConfig {
            device_base: "  ".to_string(),
            ..RelayConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_toml_keys_are_ignored() {
        // Keeps old config files working across versions.
        let cfg: RelayConfig = toml::from_str("no_such_key = 1").unwrap();
        assert_eq!(cfg.port, 8080);
    }
}
