//! Configuration module for pixelbridge
//!
//! A configuration file lists the devices to drive and how to log. It is
//! read as TOML when the path ends in `.toml` and as JSON otherwise; saving
//! always writes pretty-printed JSON.
//!
//! # Default Location
//!
//! - **Linux**: `~/.config/pixelbridge/config.json`
//! - **macOS**: `~/Library/Application Support/pixelbridge/config.json`
//! - **Windows**: `%APPDATA%\pixelbridge\config.json`
//!
//! # Example
//!
//! ```json
//! {
//!   "devices": [
//!     {
//!       "type": "innocore",
//!       "name": "wall",
//!       "map": [[0, 0, 0, 128], [0, 128, 511, -64]]
//!     }
//!   ]
//! }
//! ```
//!
//! Each `map` entry is `[channel, firstSourcePixel, firstOutputSlot, count]`.

use crate::error::{BridgeError, Result};
use crate::mapping::RangeDescriptor;
use crate::types::ChannelGeometry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory name under the platform config dir
pub const APP_DIR: &str = "pixelbridge";

/// Config filename
pub const CONFIG_FILE: &str = "config.json";

/// Current config file version
pub const CONFIG_VERSION: u32 = 1;

/// Default flush tick in milliseconds
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 10;

/// Default tracing filter when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "info,pixelbridge=debug";

/// Get the path of the default config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Config file version for future migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Devices to drive
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            devices: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load a config file, choosing the format from the extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let config: Self = if is_toml {
            toml::from_str(&content).map_err(|e| {
                BridgeError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| {
                BridgeError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save the config as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BridgeError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| BridgeError::Serialization(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            BridgeError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Check values serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            return Err(BridgeError::Config("no devices configured".to_string()));
        }
        for device in &self.devices {
            if device.flush_interval_ms == 0 {
                return Err(BridgeError::Config(format!(
                    "{}: flush_interval_ms must be greater than zero",
                    device.display_name()
                )));
            }
            if device.event_queue_depth == 0 {
                return Err(BridgeError::Config(format!(
                    "{}: event_queue_depth must be greater than zero",
                    device.display_name()
                )));
            }
            if let Some(geometry) = device.geometry() {
                geometry
                    .validate()
                    .map_err(|e| e.with_context(device.display_name()))?;
            }
        }
        Ok(())
    }

    /// Sample configuration with one Innocore device
    pub fn sample() -> Self {
        let mut device = DeviceConfig::new("innocore");
        device.name = Some("innocore0".to_string());
        device.map = vec![
            RangeDescriptor::new(0, 0, 0, 64),
            RangeDescriptor::new(0, 64, 127, -64),
        ];
        Self {
            devices: vec![device],
            ..Default::default()
        }
    }
}

/// One device entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Registry type string, e.g. `innocore`
    #[serde(rename = "type")]
    pub kind: String,

    /// Display name; defaults to the type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Range descriptors in configuration order
    #[serde(default)]
    pub map: Vec<RangeDescriptor>,

    /// LED slots per output channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<u32>,

    /// Number of output channels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_channels: Option<u32>,

    /// Bytes per LED
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_per_pixel: Option<usize>,

    /// Period of the flush tick in the binary's main loop
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Capacity of the transfer event queue
    #[serde(default = "default_event_queue_depth")]
    pub event_queue_depth: usize,
}

fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}

fn default_event_queue_depth() -> usize {
    crate::device::DEFAULT_EVENT_QUEUE_DEPTH
}

impl DeviceConfig {
    /// Create a device entry with defaults and an empty map
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            map: Vec::new(),
            channel_capacity: None,
            max_channels: None,
            bytes_per_pixel: None,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            event_queue_depth: default_event_queue_depth(),
        }
    }

    /// Name for logs: `name`, or the type string
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }

    /// Whether any geometry field is set
    pub fn has_geometry_overrides(&self) -> bool {
        self.channel_capacity.is_some()
            || self.max_channels.is_some()
            || self.bytes_per_pixel.is_some()
    }

    /// Geometry from the override fields, when both channel fields are set
    ///
    /// `bytes_per_pixel` defaults to RGB.
    pub fn geometry(&self) -> Option<ChannelGeometry> {
        Some(ChannelGeometry::new(
            self.channel_capacity?,
            self.max_channels?,
            self.bytes_per_pixel
                .unwrap_or(ChannelGeometry::INNOCORE.bytes_per_pixel),
        ))
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tracing filter directive; `RUST_LOG` takes precedence
    pub filter: Option<String>,

    /// Also write logs to this file
    pub file: Option<PathBuf>,

    /// Colored stderr output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            file: None,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Filter directive to use when `RUST_LOG` is unset
    pub fn filter_directive(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_defaults() {
        let device: DeviceConfig = serde_json::from_str(r#"{"type": "innocore"}"#).unwrap();
        assert_eq!(device.kind, "innocore");
        assert_eq!(device.display_name(), "innocore");
        assert!(device.map.is_empty());
        assert_eq!(device.flush_interval(), Duration::from_millis(10));
        assert_eq!(device.event_queue_depth, 256);
        assert!(!device.has_geometry_overrides());
    }

    #[test]
    fn test_parse_json_map_tuples() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{"devices": [{"type": "innocore", "map": [[0, 0, 62, 4], [0, 4, 65, -3]]}]}"#,
        )
        .unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(
            config.devices[0].map,
            vec![
                RangeDescriptor::new(0, 0, 62, 4),
                RangeDescriptor::new(0, 4, 65, -3)
            ]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [logging]
            filter = "warn"

            [[devices]]
            type = "generic"
            name = "strip"
            channel_capacity = 100
            max_channels = 2
            map = [[0, 0, 0, 150]]
            "#,
        )
        .unwrap();
        let device = &config.devices[0];
        assert_eq!(device.display_name(), "strip");
        assert_eq!(device.channel_capacity, Some(100));
        assert_eq!(device.map[0].count, 150);
        assert_eq!(config.logging.filter_directive(), "warn");
        assert!(config.logging.ansi);
    }

    #[test]
    fn test_validate_rejects_empty_device_list() {
        let err = BridgeConfig::default().validate().unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut config = BridgeConfig::sample();
        config.devices[0].flush_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::sample();
        config.devices[0].event_queue_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_geometry() {
        let mut config = BridgeConfig::sample();
        config.devices[0].kind = "generic".to_string();
        config.devices[0].channel_capacity = Some(4_000_000_000);
        config.devices[0].max_channels = Some(8);
        assert!(config.validate().is_err());

        config.devices[0].channel_capacity = Some(0);
        assert!(config.validate().is_err());

        config.devices[0].channel_capacity = Some(512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sample_is_valid() {
        let config = BridgeConfig::sample();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.filter_directive(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_default_config_path() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("pixelbridge/config.json"));
        }
    }
}
