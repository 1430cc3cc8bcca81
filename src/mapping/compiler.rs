use super::compiled_mapping::{CompiledMapping, MappingEntry, MappingStats};
use super::RangeDescriptor;
use crate::error::MappingError;
use crate::types::ChannelGeometry;
use std::collections::BTreeSet;

/// Compiles range descriptors into channel-bounded mapping entries
pub struct MappingCompiler;

impl MappingCompiler {
    /// Compile a mapping configuration for a controller.
    ///
    /// Every descriptor is split into entries that stay inside a single
    /// output channel. Compilation is all-or-nothing: the first invalid
    /// descriptor aborts with an error and no partial mapping is produced.
    ///
    /// # Arguments
    /// * `descriptors` - Ranges in configuration order
    /// * `channel_capacity` - Slots per output channel
    /// * `max_channels` - Number of output channels
    ///
    /// # Returns
    /// A `CompiledMapping` whose entry lengths sum to `Σ|count|`
    pub fn compile(
        descriptors: &[RangeDescriptor],
        channel_capacity: u32,
        max_channels: u32,
    ) -> Result<CompiledMapping, MappingError> {
        let start_time = std::time::Instant::now();
        let geometry = ChannelGeometry::new(channel_capacity, max_channels, 0);

        let mut entries = Vec::new();
        for (index, descriptor) in descriptors.iter().enumerate() {
            Self::compile_range(index, descriptor, &geometry, &mut entries)?;
        }

        let total_mapped_pixels: u64 = entries.iter().map(|e| u64::from(e.length)).sum();
        let output_channels: Vec<u32> = entries
            .iter()
            .map(|e| e.output_channel)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let stats = MappingStats {
            descriptors: descriptors.len(),
            entries: entries.len(),
            channels_used: output_channels.len(),
            compile_time_us: start_time.elapsed().as_micros() as u64,
        };

        Ok(CompiledMapping {
            entries,
            total_mapped_pixels,
            output_channels,
            channel_capacity,
            max_channels,
            stats,
        })
    }

    /// Compile for a controller geometry
    pub fn compile_for(
        descriptors: &[RangeDescriptor],
        geometry: &ChannelGeometry,
    ) -> Result<CompiledMapping, MappingError> {
        Self::compile(descriptors, geometry.channel_capacity, geometry.max_channels)
    }

    /// Split one descriptor into channel-bounded chunks
    fn compile_range(
        index: usize,
        descriptor: &RangeDescriptor,
        geometry: &ChannelGeometry,
        entries: &mut Vec<MappingEntry>,
    ) -> Result<(), MappingError> {
        if descriptor.count == 0 {
            return Ok(());
        }

        let limit = geometry.total_slots();
        if u64::from(descriptor.first_output_slot) >= limit {
            return Err(MappingError::SlotOutOfRange {
                descriptor: index,
                slot: descriptor.first_output_slot,
                limit,
            });
        }

        // All arithmetic in i64: slots may step below zero before clipping
        let capacity = i64::from(geometry.channel_capacity);
        let max_channels = i64::from(geometry.max_channels);
        let increment: i64 = if descriptor.count > 0 { 1 } else { -1 };

        // More pixels than the controller has slots always overruns, so the
        // walk never needs to count further than one past the limit
        let mut remaining = i64::try_from(descriptor.count.unsigned_abs().min(limit + 1))
            .unwrap_or(i64::MAX);
        let mut source_offset = u64::from(descriptor.first_source_pixel);
        let mut channel = i64::from(descriptor.first_output_slot) / capacity;
        let mut slot = i64::from(descriptor.first_output_slot) % capacity;

        while remaining > 0 {
            let last_slot = slot.saturating_add((remaining - 1).saturating_mul(increment));
            let chunk = if last_slot >= capacity {
                capacity - slot
            } else if last_slot < 0 {
                slot + 1
            } else {
                remaining
            };

            entries.push(MappingEntry {
                source_pixel_offset: source_offset,
                length: chunk as u32,
                output_channel: channel as u32,
                output_slot_start: slot as u32,
                increment: increment as i8,
            });

            source_offset += chunk as u64;
            remaining -= chunk;
            channel += increment;
            slot = if increment > 0 { 0 } else { capacity - 1 };

            if remaining > 0 && !(0..max_channels).contains(&channel) {
                return Err(MappingError::ChannelOverrun {
                    descriptor: index,
                    channel,
                });
            }
        }

        Ok(())
    }
}
