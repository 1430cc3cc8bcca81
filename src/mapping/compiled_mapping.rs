use crate::types::ChannelGeometry;
use serde::Serialize;

/// One channel-bounded slice of a mapping.
///
/// Copies `length` pixels starting at `source_pixel_offset` of the source
/// frame into `output_channel`, beginning at `output_slot_start` and stepping
/// by `increment`. Every touched slot lies in `[0, channel_capacity)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    /// First source pixel copied by this entry
    pub source_pixel_offset: u64,
    /// Number of pixels copied
    pub length: u32,
    /// Hardware output channel
    pub output_channel: u32,
    /// First slot written within the channel
    pub output_slot_start: u32,
    /// +1 walks slots upward, -1 walks them downward
    pub increment: i8,
}

impl MappingEntry {
    /// Output slot written for the `i`-th pixel of this entry
    pub fn slot_at(&self, i: u32) -> u32 {
        if self.increment > 0 {
            self.output_slot_start + i
        } else {
            self.output_slot_start - i
        }
    }
}

/// Compiled channel mapping.
/// Immutable once built; a reconfiguration builds and installs a new one.
#[derive(Debug, Clone)]
pub struct CompiledMapping {
    /// Entries in configuration order
    pub entries: Vec<MappingEntry>,

    /// Sum of all entry lengths; sizes the frame buffers
    pub total_mapped_pixels: u64,

    /// Output channels touched by at least one entry, ascending
    pub output_channels: Vec<u32>,

    /// Slots per channel this mapping was compiled for
    pub channel_capacity: u32,

    /// Channel count this mapping was compiled for
    pub max_channels: u32,

    /// Compilation statistics
    pub stats: MappingStats,
}

/// Statistics about a compiled mapping
#[derive(Debug, Clone, Default, Serialize)]
pub struct MappingStats {
    /// Number of descriptors in the configuration
    pub descriptors: usize,

    /// Number of emitted entries
    pub entries: usize,

    /// Number of distinct output channels in use
    pub channels_used: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

impl CompiledMapping {
    /// Check if the mapping maps any pixel at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scatter a source frame into per-channel output frames.
    ///
    /// Pixels whose source bytes lie past the end of `source` are left
    /// untouched in the output. Slots not covered by any entry are never
    /// written.
    pub fn render_into(&self, source: &[u8], frames: &mut ChannelFrames) {
        let bpp = frames.bytes_per_pixel;
        if bpp == 0 {
            return;
        }

        for entry in &self.entries {
            let Some(frame) = frames.channels.get_mut(entry.output_channel as usize) else {
                continue;
            };

            for i in 0..entry.length {
                let src = (entry.source_pixel_offset as usize + i as usize) * bpp;
                let Some(pixel) = source.get(src..src + bpp) else {
                    break;
                };
                let dst = entry.slot_at(i) as usize * bpp;
                if let Some(out) = frame.get_mut(dst..dst + bpp) {
                    out.copy_from_slice(pixel);
                }
            }
        }
    }
}

/// Per-channel output frames for one controller
#[derive(Debug, Clone)]
pub struct ChannelFrames {
    channels: Vec<Vec<u8>>,
    bytes_per_pixel: usize,
}

impl ChannelFrames {
    /// Allocate zeroed frames for every channel of a controller
    ///
    /// The geometry must have passed [`ChannelGeometry::validate`].
    pub fn new(geometry: &ChannelGeometry) -> Self {
        Self {
            channels: vec![vec![0; geometry.channel_bytes()]; geometry.max_channels as usize],
            bytes_per_pixel: geometry.bytes_per_pixel,
        }
    }

    /// Output bytes for a channel
    pub fn channel(&self, channel: u32) -> Option<&[u8]> {
        self.channels.get(channel as usize).map(Vec::as_slice)
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Check if there are no channels
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Zero every channel
    pub fn clear(&mut self) {
        for frame in &mut self.channels {
            frame.fill(0);
        }
    }
}
