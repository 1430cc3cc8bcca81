//! Core data types shared by the mapping compiler and the transfer pipeline
//!
//! # Main Types
//!
//! - [`ChannelGeometry`] - Shape of a controller (channels, slots, bytes per LED)
//! - [`PipelinePhase`] - Observable phase of a device's transfer pipeline
//! - [`TransferStats`] - Counters and latency tracking for frame transfers

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Size of the rolling window for recent transfer times
const RECENT_WINDOW_SIZE: usize = 100;

/// Upper bound on the rendered output of one controller (all channels)
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Physical shape of a multi-channel LED controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelGeometry {
    /// LED slots per output channel
    pub channel_capacity: u32,
    /// Number of output channels
    pub max_channels: u32,
    /// Bytes carried per LED (3 for RGB)
    pub bytes_per_pixel: usize,
}

impl ChannelGeometry {
    /// Advantech Innocore LED controller: 8 channels of 64 RGB LEDs
    pub const INNOCORE: Self = Self {
        channel_capacity: 64,
        max_channels: 8,
        bytes_per_pixel: 3,
    };

    /// Create a geometry
    pub fn new(channel_capacity: u32, max_channels: u32, bytes_per_pixel: usize) -> Self {
        Self {
            channel_capacity,
            max_channels,
            bytes_per_pixel,
        }
    }

    /// Bytes needed for one full output channel
    pub fn channel_bytes(&self) -> usize {
        self.channel_capacity as usize * self.bytes_per_pixel
    }

    /// Total addressable slots across all channels
    pub fn total_slots(&self) -> u64 {
        u64::from(self.channel_capacity) * u64::from(self.max_channels)
    }

    /// Bytes of rendered output across all channels, if that fits in `usize`
    pub fn frame_bytes(&self) -> Option<usize> {
        self.channel_capacity
            .try_into()
            .ok()
            .and_then(|capacity: usize| capacity.checked_mul(self.bytes_per_pixel))
            .and_then(|bytes| bytes.checked_mul(self.max_channels as usize))
    }

    /// Reject geometries with an empty dimension or more output than
    /// [`MAX_FRAME_BYTES`]
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 || self.max_channels == 0 || self.bytes_per_pixel == 0 {
            return Err(BridgeError::Config(format!(
                "geometry {} has an empty dimension",
                self
            )));
        }
        match self.frame_bytes() {
            Some(bytes) if bytes <= MAX_FRAME_BYTES => Ok(()),
            _ => Err(BridgeError::Config(format!(
                "geometry {} exceeds the {} byte frame limit",
                self, MAX_FRAME_BYTES
            ))),
        }
    }
}

impl Default for ChannelGeometry {
    fn default() -> Self {
        Self::INNOCORE
    }
}

impl std::fmt::Display for ChannelGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ch x {} LEDs x {} B",
            self.max_channels, self.channel_capacity, self.bytes_per_pixel
        )
    }
}

/// Phase of the transfer pipeline as seen from outside
///
/// Exactly one phase holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PipelinePhase {
    /// Nothing in flight and nothing waiting
    #[default]
    Idle,
    /// A publish arrived while a transfer was in flight
    Pending,
    /// The transmit buffer is being pushed to hardware
    InFlight,
}

impl PipelinePhase {
    /// Number of transfers in flight in this phase (0 or 1)
    pub fn transfers_in_flight(&self) -> usize {
        match self {
            PipelinePhase::Idle => 0,
            PipelinePhase::Pending | PipelinePhase::InFlight => 1,
        }
    }
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Idle => write!(f, "Idle"),
            PipelinePhase::Pending => write!(f, "Pending"),
            PipelinePhase::InFlight => write!(f, "In flight"),
        }
    }
}

/// Statistics for the frame transfer pipeline
///
/// Tracks how many frames were published, coalesced and sent, plus latency
/// metrics for completed transfers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferStats {
    /// Publishes that started a transfer immediately
    pub frames_published: u64,
    /// Publishes that found a transfer in flight and marked a pending frame
    pub frames_deferred: u64,
    /// Publishes that replaced an already pending frame
    pub frames_coalesced: u64,
    /// Frames pushed and committed successfully
    pub frames_sent: u64,
    /// Frames that failed in the transport
    pub frames_failed: u64,
    /// Messages rejected by the ingestion path
    pub ingest_rejected: u64,
    /// Events dropped because the owner's queue was full
    pub dropped_events: u64,
    /// Total transfer time in microseconds
    pub total_transfer_time_us: u64,
    /// Last transfer time in microseconds
    pub last_transfer_time_us: u64,
    /// Minimum transfer time observed (microseconds)
    pub min_transfer_time_us: u64,
    /// Maximum transfer time observed (microseconds)
    pub max_transfer_time_us: u64,
    /// Rolling window of recent transfer times for jitter calculation
    #[serde(skip)]
    pub recent_transfer_times: VecDeque<u64>,
}

impl Default for TransferStats {
    fn default() -> Self {
        Self {
            frames_published: 0,
            frames_deferred: 0,
            frames_coalesced: 0,
            frames_sent: 0,
            frames_failed: 0,
            ingest_rejected: 0,
            dropped_events: 0,
            total_transfer_time_us: 0,
            last_transfer_time_us: 0,
            min_transfer_time_us: u64::MAX,
            max_transfer_time_us: 0,
            recent_transfer_times: VecDeque::with_capacity(RECENT_WINDOW_SIZE),
        }
    }
}

impl TransferStats {
    /// Calculate average transfer time in microseconds
    pub fn avg_transfer_time_us(&self) -> f64 {
        if self.frames_sent == 0 {
            0.0
        } else {
            self.total_transfer_time_us as f64 / self.frames_sent as f64
        }
    }

    /// Record a completed transfer with latency tracking
    pub fn record_success(&mut self, time_us: u64) {
        self.frames_sent += 1;
        self.total_transfer_time_us += time_us;
        self.last_transfer_time_us = time_us;
        self.min_transfer_time_us = self.min_transfer_time_us.min(time_us);
        self.max_transfer_time_us = self.max_transfer_time_us.max(time_us);

        self.recent_transfer_times.push_back(time_us);
        if self.recent_transfer_times.len() > RECENT_WINDOW_SIZE {
            self.recent_transfer_times.pop_front();
        }
    }

    /// Record a failed transfer
    pub fn record_failure(&mut self) {
        self.frames_failed += 1;
    }

    /// Calculate jitter (max - min) over recent window in microseconds
    pub fn jitter_us(&self) -> u64 {
        let min = self.recent_transfer_times.iter().min().copied().unwrap_or(0);
        let max = self.recent_transfer_times.iter().max().copied().unwrap_or(0);
        max.saturating_sub(min)
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_innocore_geometry() {
        let g = ChannelGeometry::INNOCORE;
        assert_eq!(g.channel_bytes(), 192);
        assert_eq!(g.total_slots(), 512);
        assert_eq!(g.to_string(), "8 ch x 64 LEDs x 3 B");
        assert_eq!(g.frame_bytes(), Some(1536));
        assert!(g.validate().is_ok());
    }

    #[test]
    fn test_geometry_validation_bounds() {
        assert!(ChannelGeometry::new(0, 8, 3).validate().is_err());
        assert!(ChannelGeometry::new(64, 0, 3).validate().is_err());
        assert!(ChannelGeometry::new(64, 8, 0).validate().is_err());
        assert!(ChannelGeometry::new(4_000_000_000, 8, 3).validate().is_err());
        assert!(ChannelGeometry::new(u32::MAX, u32::MAX, usize::MAX).validate().is_err());

        let largest = ChannelGeometry::new((MAX_FRAME_BYTES / 3) as u32, 1, 3);
        assert!(largest.validate().is_ok());
    }

    #[test]
    fn test_phase_in_flight_count() {
        assert_eq!(PipelinePhase::Idle.transfers_in_flight(), 0);
        assert_eq!(PipelinePhase::InFlight.transfers_in_flight(), 1);
        assert_eq!(PipelinePhase::Pending.transfers_in_flight(), 1);
    }

    #[test]
    fn test_stats_latency_tracking() {
        let mut stats = TransferStats::default();
        assert_eq!(stats.avg_transfer_time_us(), 0.0);
        assert_eq!(stats.jitter_us(), 0);

        stats.record_success(100);
        stats.record_success(300);
        stats.record_failure();

        assert_eq!(stats.frames_sent, 2);
        assert_eq!(stats.frames_failed, 1);
        assert_eq!(stats.avg_transfer_time_us(), 200.0);
        assert_eq!(stats.min_transfer_time_us, 100);
        assert_eq!(stats.max_transfer_time_us, 300);
        assert_eq!(stats.jitter_us(), 200);

        stats.reset();
        assert_eq!(stats.frames_sent, 0);
    }

    #[test]
    fn test_stats_window_is_bounded() {
        let mut stats = TransferStats::default();
        for i in 0..(RECENT_WINDOW_SIZE as u64 + 20) {
            stats.record_success(i);
        }
        assert_eq!(stats.recent_transfer_times.len(), RECENT_WINDOW_SIZE);
        assert_eq!(stats.recent_transfer_times.front().copied(), Some(20));
    }
}
