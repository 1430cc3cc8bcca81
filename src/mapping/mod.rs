//! Channel mapping: logical pixel ranges → hardware channel slices.
//!
//! A mapping configuration is an ordered list of [`RangeDescriptor`]s, each
//! saying "take `count` pixels starting at `first_source_pixel` of the
//! incoming frame and place them at output slot `first_output_slot`,
//! walking forward (positive count) or backward (negative count)". Output
//! slots are numbered across the whole controller, so a single range may span
//! several fixed-capacity channels.
//!
//! ```text
//! [0, 0, 60, 10]   channel capacity 64
//!
//!   channel 0: ... 60 61 62 63 |
//!   channel 1:                 | 0 1 2 3 4 5 ...
//! ```
//!
//! [`MappingCompiler::compile`] splits every range into [`MappingEntry`]s that
//! never cross a channel boundary. The result is an immutable
//! [`CompiledMapping`] that sizes the frame buffers and renders source frames
//! into per-channel output frames.

pub mod compiled_mapping;
pub mod compiler;

pub use compiled_mapping::{ChannelFrames, CompiledMapping, MappingEntry, MappingStats};
pub use compiler::MappingCompiler;

use serde::{Deserialize, Serialize};

/// The only logical input channel accepted by the core
pub const INPUT_CHANNEL: u32 = 0;

/// Wire form of a descriptor: `[channel, firstSourcePixel, firstOutputSlot, count]`
type RangeTuple = (u32, u32, u32, i64);

/// One range of a mapping configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RangeTuple", into = "RangeTuple")]
pub struct RangeDescriptor {
    /// Logical input channel (must be [`INPUT_CHANNEL`])
    pub channel: u32,
    /// First pixel of the incoming frame covered by this range
    pub first_source_pixel: u32,
    /// First output slot, numbered across all channels
    pub first_output_slot: u32,
    /// Number of pixels; negative walks the output backward
    pub count: i64,
}

impl RangeDescriptor {
    /// Create a descriptor
    pub fn new(channel: u32, first_source_pixel: u32, first_output_slot: u32, count: i64) -> Self {
        Self {
            channel,
            first_source_pixel,
            first_output_slot,
            count,
        }
    }

    /// Number of pixels covered, ignoring direction
    pub fn pixel_count(&self) -> u64 {
        self.count.unsigned_abs()
    }
}

impl From<RangeTuple> for RangeDescriptor {
    fn from((channel, first_source_pixel, first_output_slot, count): RangeTuple) -> Self {
        Self::new(channel, first_source_pixel, first_output_slot, count)
    }
}

impl From<RangeDescriptor> for RangeTuple {
    fn from(d: RangeDescriptor) -> Self {
        (d.channel, d.first_source_pixel, d.first_output_slot, d.count)
    }
}
