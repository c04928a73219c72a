//! Module configuration.
//!
//! Loaded from YAML; every field has a default, so an empty file (or no file)
//! gives the factory setup used by the field deployments:
//!
//! ```yaml
//! port: /dev/ttyUSB0
//! baud: 57600
//! network_id: 0x7FFF
//! api_mode: 2
//! node_type: 0
//! discovery_options: 4
//! log_dir: ./Output
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use digimesh_api::ApiMode;
use digimesh_at::SessionTiming;
use serde::{Deserialize, Serialize};

use crate::error::*;

/// Registers read back after programming, with the hex width their values
/// are zero-padded to.
pub const TRACKED_REGISTERS: &[(&str, usize)] = &[
    ("ID", 4),
    ("CE", 2),
    ("BH", 2),
    ("SH", 8),
    ("SL", 8),
    ("DH", 8),
    ("DL", 8),
    ("AP", 2),
];

/// Command mode delays, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Guard time before the first `+++`.
    pub first_guard_ms: u64,
    /// Guard time afterwards.
    pub guard_ms: u64,
    /// `OK` deadline on the first entry and while probing.
    pub first_ack_timeout_ms: u64,
    /// `OK` deadline afterwards.
    pub ack_timeout_ms: u64,
    /// Register query reply deadline.
    pub reply_timeout_ms: u64,
    /// Pause after writing the register list.
    pub settle_after_write_ms: u64,
    /// Pause after `ATCN`.
    pub settle_after_exit_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            first_guard_ms: 1000,
            guard_ms: 10,
            first_ack_timeout_ms: 1200,
            ack_timeout_ms: 1000,
            reply_timeout_ms: 1000,
            settle_after_write_ms: 200,
            settle_after_exit_ms: 100,
        }
    }
}

/// Everything needed to open and program a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleConfig {
    /// Serial port; the first available port when unset.
    pub port: Option<String>,
    /// Baud rate the module should run at.
    pub baud: u32,
    /// Network id (ID), 0x0000-0x7FFF.
    pub network_id: u16,
    /// API mode (AP): 0 transparent, 1 API, 2 API with escaping.
    pub api_mode: u8,
    /// Node type (CE): 0 router, 2 end point.
    pub node_type: u8,
    /// Discovery options (NO).
    pub discovery_options: u8,
    /// Directory for the raw log; no raw log when unset.
    pub log_dir: Option<PathBuf>,
    /// Read loop idle sleep in milliseconds.
    pub poll_interval_ms: u64,
    /// Command mode timing.
    pub timing: TimingConfig,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        ModuleConfig {
            port: None,
            baud: 9600,
            network_id: 0x7FFF,
            api_mode: 2,
            node_type: 0,
            discovery_options: 0x04,
            log_dir: Some(PathBuf::from("./Output")),
            poll_interval_ms: 100,
            timing: TimingConfig::default(),
        }
    }
}

impl ModuleConfig {
    /// Load a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> DriverResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse YAML text.
    pub fn from_yaml(text: &str) -> DriverResult<Self> {
        if text.trim().is_empty() {
            return Ok(ModuleConfig::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Registers written at startup, as lowercase hex values, in order.
    pub fn programmed_registers(&self) -> Vec<(String, String)> {
        vec![
            ("ID".to_string(), format!("{:x}", self.network_id)),
            ("AP".to_string(), format!("{:x}", self.api_mode)),
            ("CE".to_string(), format!("{:x}", self.node_type)),
            ("NO".to_string(), format!("{:x}", self.discovery_options)),
            ("DL".to_string(), "ffff".to_string()),
            ("DH".to_string(), "0".to_string()),
        ]
    }

    /// Configured API mode; out of range codes fall back to escaped API.
    pub fn api_mode(&self) -> ApiMode {
        ApiMode::from_code(self.api_mode).unwrap_or_default()
    }

    /// Human readable node type.
    pub fn node_type_name(&self) -> &'static str {
        match self.node_type {
            0 => "Router",
            2 => "EndPoint",
            _ => "ERR",
        }
    }

    /// Read loop idle sleep.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Command mode timing.
    pub fn session_timing(&self) -> SessionTiming {
        let t = &self.timing;
        SessionTiming {
            first_guard: Duration::from_millis(t.first_guard_ms),
            guard: Duration::from_millis(t.guard_ms),
            first_ack_timeout: Duration::from_millis(t.first_ack_timeout_ms),
            ack_timeout: Duration::from_millis(t.ack_timeout_ms),
            reply_timeout: Duration::from_millis(t.reply_timeout_ms),
            settle_after_write: Duration::from_millis(t.settle_after_write_ms),
            settle_after_exit: Duration::from_millis(t.settle_after_exit_ms),
            ..SessionTiming::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModuleConfig::default();
        assert_eq!(config.baud, 9600);
        assert_eq!(config.api_mode(), ApiMode::ApiEscaped);
        assert_eq!(config.node_type_name(), "Router");
        assert_eq!(config.session_timing(), SessionTiming::default());
    }

    #[test]
    fn test_programmed_registers() {
        let registers = ModuleConfig::default().programmed_registers();
        let expected = [
            ("ID", "7fff"),
            ("AP", "2"),
            ("CE", "0"),
            ("NO", "4"),
            ("DL", "ffff"),
            ("DH", "0"),
        ];
        assert_eq!(registers.len(), expected.len());
        for ((name, value), (exp_name, exp_value)) in registers.iter().zip(expected) {
            assert_eq!(name, exp_name);
            assert_eq!(value, exp_value);
        }
    }

    #[test]
    fn test_partial_yaml() {
        let config = ModuleConfig::from_yaml(
            "port: /dev/ttyUSB0\nbaud: 57600\napi_mode: 1\ntiming:\n  guard_ms: 20\n",
        )
        .unwrap();
        assert_eq!(config.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.baud, 57600);
        assert_eq!(config.api_mode(), ApiMode::Api);
        assert_eq!(config.network_id, 0x7FFF);
        assert_eq!(config.timing.guard_ms, 20);
        assert_eq!(config.timing.first_guard_ms, 1000);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(ModuleConfig::from_yaml("").unwrap(), ModuleConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            ModuleConfig::from_yaml("bogus: 1\n"),
            Err(DriverError::Config(_))
        ));
    }
}
