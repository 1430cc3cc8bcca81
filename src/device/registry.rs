//! Device registry - data-driven device creation.
//!
//! Maps the `type` string of a device configuration to a factory. The binary
//! and tests only ever see `Box<dyn LedDevice>`.

use super::controller::ChannelController;
use super::LedDevice;
use crate::config::DeviceConfig;
use crate::error::{BridgeError, Result};
use crate::transport::LedTransport;
use crate::types::ChannelGeometry;

/// Builds a device from its configuration and a transport
pub type DeviceFactory = fn(&DeviceConfig, Box<dyn LedTransport>) -> Result<Box<dyn LedDevice>>;

/// Metadata for a device kind, including its factory function.
#[derive(Clone)]
pub struct DeviceKindInfo {
    pub kind: &'static str,
    pub display_name: &'static str,
    pub factory: DeviceFactory,
}

/// Registry of known device kinds
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    kinds: Vec<DeviceKindInfo>,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in device kinds
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(DeviceKindInfo {
            kind: "innocore",
            display_name: "Advantech Innocore LED controller",
            factory: create_innocore,
        });
        registry.register(DeviceKindInfo {
            kind: "generic",
            display_name: "Generic multi-channel controller",
            factory: create_generic,
        });
        registry
    }

    /// Register a device kind, replacing any existing entry of the same name
    pub fn register(&mut self, info: DeviceKindInfo) {
        self.kinds.retain(|k| k.kind != info.kind);
        self.kinds.push(info);
    }

    /// Registered kinds in registration order
    pub fn kinds(&self) -> impl Iterator<Item = &DeviceKindInfo> {
        self.kinds.iter()
    }

    /// Look up a kind by its configuration string
    pub fn get(&self, kind: &str) -> Option<&DeviceKindInfo> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    /// Build a device for `config`
    ///
    /// The device is returned closed and without a mapping.
    pub fn create(
        &self,
        config: &DeviceConfig,
        transport: Box<dyn LedTransport>,
    ) -> Result<Box<dyn LedDevice>> {
        let info = self.get(&config.kind).ok_or_else(|| {
            let known: Vec<_> = self.kinds.iter().map(|k| k.kind).collect();
            BridgeError::Device(format!(
                "unknown device type '{}' (known: {})",
                config.kind,
                known.join(", ")
            ))
        })?;
        tracing::debug!(kind = info.kind, name = %config.display_name(), "Creating device");
        (info.factory)(config, transport)
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.kinds.iter().map(|k| k.kind))
            .finish()
    }
}

fn create_innocore(
    config: &DeviceConfig,
    transport: Box<dyn LedTransport>,
) -> Result<Box<dyn LedDevice>> {
    if config.has_geometry_overrides() {
        tracing::warn!(
            name = %config.display_name(),
            "Ignoring geometry overrides for fixed-geometry innocore device"
        );
    }
    Ok(Box::new(ChannelController::new(
        "innocore",
        config.display_name(),
        ChannelGeometry::INNOCORE,
        transport,
        config.event_queue_depth,
    )))
}

fn create_generic(
    config: &DeviceConfig,
    transport: Box<dyn LedTransport>,
) -> Result<Box<dyn LedDevice>> {
    let Some(geometry) = config.geometry() else {
        return Err(BridgeError::Device(format!(
            "{}: generic devices need channel_capacity and max_channels",
            config.display_name()
        )));
    };
    geometry
        .validate()
        .map_err(|e| e.with_context(config.display_name()))?;
    Ok(Box::new(ChannelController::new(
        "generic",
        config.display_name(),
        geometry,
        transport,
        config.event_queue_depth,
    )))
}
