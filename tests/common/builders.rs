//! Test data builders for creating test objects

use pixelbridge::config::{BridgeConfig, DeviceConfig};
use pixelbridge::mapping::RangeDescriptor;

/// Builder for a list of range descriptors on input channel 0
#[derive(Default)]
pub struct MappingBuilder {
    ranges: Vec<RangeDescriptor>,
    next_source_pixel: u32,
}

impl MappingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a range that continues where the previous one ended in the source
    pub fn range(mut self, first_output_slot: u32, count: i64) -> Self {
        self.ranges.push(RangeDescriptor::new(
            0,
            self.next_source_pixel,
            first_output_slot,
            count,
        ));
        self.next_source_pixel += count.unsigned_abs() as u32;
        self
    }

    /// Append an arbitrary descriptor
    pub fn raw(mut self, descriptor: RangeDescriptor) -> Self {
        self.ranges.push(descriptor);
        self
    }

    pub fn build(self) -> Vec<RangeDescriptor> {
        self.ranges
    }
}

/// Builder for a device config entry
pub struct DeviceConfigBuilder {
    config: DeviceConfig,
}

impl DeviceConfigBuilder {
    pub fn new(kind: &str) -> Self {
        Self {
            config: DeviceConfig::new(kind),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.name = Some(name.to_string());
        self
    }

    pub fn geometry(mut self, channel_capacity: u32, max_channels: u32) -> Self {
        self.config.channel_capacity = Some(channel_capacity);
        self.config.max_channels = Some(max_channels);
        self
    }

    pub fn map(mut self, map: Vec<RangeDescriptor>) -> Self {
        self.config.map = map;
        self
    }

    pub fn event_queue_depth(mut self, depth: usize) -> Self {
        self.config.event_queue_depth = depth;
        self
    }

    pub fn build(self) -> DeviceConfig {
        self.config
    }

    /// Wrap in a single-device bridge config
    pub fn into_bridge_config(self) -> BridgeConfig {
        BridgeConfig {
            devices: vec![self.config],
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_builder_chains_source_pixels() {
        let map = MappingBuilder::new().range(0, 10).range(100, -5).build();
        assert_eq!(map[1], RangeDescriptor::new(0, 10, 100, -5));
    }
}
