//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::time::Duration;

/// Generous timeout for waiting on the transfer thread
pub fn test_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Short wait used to show that something does *not* happen
pub fn settle_time() -> Duration {
    Duration::from_millis(50)
}

/// A frame of `pixels` RGB pixels where every byte of pixel `i` is `fill(i)`
pub fn rgb_frame(pixels: usize, fill: impl Fn(usize) -> u8) -> Vec<u8> {
    (0..pixels).flat_map(|i| [fill(i); 3]).collect()
}
