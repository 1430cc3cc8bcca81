//! Dry-run transport that logs frames instead of driving hardware.

use super::LedTransport;
use crate::error::TransportError;

/// Logs a summary of each committed frame at debug level
#[derive(Debug, Default)]
pub struct TracingTransport {
    staged_channels: usize,
    staged_bytes: usize,
    checksum: u32,
    commits: u64,
}

impl TracingTransport {
    /// Create a new dry-run transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames committed so far
    pub fn commits(&self) -> u64 {
        self.commits
    }
}

impl LedTransport for TracingTransport {
    fn push(&mut self, channel: u32, data: &[u8]) -> Result<(), TransportError> {
        self.staged_channels += 1;
        self.staged_bytes += data.len();
        self.checksum = data
            .iter()
            .fold(self.checksum, |acc, &b| acc.rotate_left(5) ^ u32::from(b));
        tracing::trace!(channel, bytes = data.len(), "staged channel");
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TransportError> {
        self.commits += 1;
        tracing::debug!(
            frame = self.commits,
            channels = self.staged_channels,
            bytes = self.staged_bytes,
            checksum = %format!("{:08x}", self.checksum),
            "frame committed"
        );
        self.staged_channels = 0;
        self.staged_bytes = 0;
        self.checksum = 0;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "trace"
    }
}
