//! Hardware transport interface
//!
//! The transfer task hands every rendered frame to an [`LedTransport`]: one
//! [`push`](LedTransport::push) per output channel touched by the mapping,
//! followed by a single [`commit`](LedTransport::commit) that latches the
//! frame on the controller. Both calls may block on I/O; any timeout is the
//! transport's own business.
//!
//! # Implementations
//!
//! - [`MockTransport`] - Records committed frames in memory, with an optional
//!   gate that holds each commit until released (used by tests and demos)
//! - [`TracingTransport`] - Dry-run sink that logs a summary of every frame

pub mod mock;
pub mod tracing_sink;

pub use mock::{CommittedFrame, MockTransport, MockTransportHandle};
pub use tracing_sink::TracingTransport;

use crate::error::TransportError;

/// Unified interface for LED controller transports
///
/// Implementations must be `Send`: the transport is moved onto the device's
/// transfer thread when the device opens, and handed back when it closes.
///
/// # Example
///
/// ```ignore
/// fn send_frame(transport: &mut dyn LedTransport, frames: &ChannelFrames, channels: &[u32]) -> Result<(), TransportError> {
///     for &ch in channels {
///         transport.push(ch, frames.channel(ch).unwrap_or_default())?;
///     }
///     transport.commit()
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait LedTransport: Send {
    /// Stage LED data for one output channel
    ///
    /// # Arguments
    /// * `channel` - Hardware output channel
    /// * `data` - `channel_capacity * bytes_per_pixel` bytes of LED data
    fn push(&mut self, channel: u32, data: &[u8]) -> Result<(), TransportError>;

    /// Latch all staged channels onto the LEDs
    fn commit(&mut self) -> Result<(), TransportError>;

    /// Short identifier for logs and device descriptions
    fn kind(&self) -> &'static str;
}
