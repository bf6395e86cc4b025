//! Simulator configuration (TOML).
//!
//! Path comes from `OCPP_SIM_CONFIG`, falling back to `./config.toml`;
//! missing file means defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::support::errors::SimulatorError;

pub const DEFAULT_SUPERVISION_URL: &str = "ws://localhost:8080/ocpp";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub supervision: SupervisionConfig,
    /// Directory for best-effort connector-state snapshots; `None` disables
    /// persistence.
    pub data_dir: Option<PathBuf>,
    pub stations: Vec<FleetEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisionConfig {
    /// Base WebSocket URL; the station id is appended as the path tail.
    pub url: String,
    /// Outbound request timeout, seconds.
    pub request_timeout_secs: u64,
}

/// One fleet entry: a template file and how many stations boot from it.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetEntry {
    pub template: PathBuf,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            supervision: SupervisionConfig::default(),
            data_dir: None,
            stations: Vec::new(),
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

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SUPERVISION_URL.to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, SimulatorError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SimulatorError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: AppConfig = toml::from_str(&raw)
            .map_err(|e| SimulatorError::Config(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimulatorError> {
        if !self.supervision.url.starts_with("ws://") && !self.supervision.url.starts_with("wss://")
        {
            return Err(SimulatorError::Config(format!(
                "supervision.url must be a ws:// or wss:// URL, got {}",
                self.supervision.url
            )));
        }
        if self.supervision.request_timeout_secs == 0 {
            return Err(SimulatorError::Config(
                "supervision.request_timeout_secs must be > 0".into(),
            ));
        }
        for entry in &self.stations {
            if entry.count == 0 {
                return Err(SimulatorError::Config(format!(
                    "station entry {} has count 0",
                    entry.template.display()
                )));
            }
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    std::env::var("OCPP_SIM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let config: AppConfig = toml::from_str(
            r#"
            data_dir = "var/state"

            [logging]
            level = "debug"

            [supervision]
            url = "ws://csms.example:9000/ocpp"
            request_timeout_secs = 30

            [[stations]]
            template = "templates/ac-22kw.json"
            count = 3

            [[stations]]
            template = "templates/dc-50kw.json"
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.supervision.request_timeout_secs, 30);
        assert_eq!(config.stations.len(), 2);
        assert_eq!(config.stations[0].count, 3);
        assert_eq!(config.stations[1].count, 1);
    }

    #[test]
    fn defaults_apply_on_empty_config() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.supervision.url, DEFAULT_SUPERVISION_URL);
        assert_eq!(config.supervision.request_timeout_secs, 60);
        assert!(config.stations.is_empty());
    }

    #[test]
    fn rejects_non_websocket_url() {
        let config: AppConfig = toml::from_str(
            r#"
            [supervision]
            url = "http://not-a-socket"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
