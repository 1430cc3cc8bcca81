//! Double-buffered frame storage
//!
//! The back buffer is the ingestion target; the transmit buffer is what the
//! transfer task reads. They are never aliased. The only copy between them is
//! [`FrameStore::snapshot_to_transmit`], which callers make only while no
//! transfer is reading the transmit buffer.
//!
//! While a transfer runs, the task holds the transmit buffer itself
//! ([`FrameStore::checkout_transmit`]) so no lock is held across hardware I/O.

use crate::error::{IngestError, MappingError};

/// Back and transmit buffers sized from a compiled mapping
#[derive(Debug)]
pub struct FrameStore {
    back: Vec<u8>,
    transmit: Vec<u8>,
    capacity: usize,
    generation: u64,
    transmit_on_loan: bool,
}

impl FrameStore {
    /// Allocate both buffers for `mapped_pixels * bytes_per_pixel` bytes.
    ///
    /// Zero mapped pixels yields [`MappingError::NotReady`]; a failed
    /// reservation yields [`MappingError::AllocationFailed`].
    pub fn allocate(
        mapped_pixels: u64,
        bytes_per_pixel: usize,
        generation: u64,
    ) -> Result<Self, MappingError> {
        if mapped_pixels == 0 || bytes_per_pixel == 0 {
            return Err(MappingError::NotReady);
        }

        let capacity = usize::try_from(mapped_pixels)
            .ok()
            .and_then(|pixels| pixels.checked_mul(bytes_per_pixel))
            .ok_or(MappingError::AllocationFailed { bytes: usize::MAX })?;

        Ok(Self {
            back: Self::zeroed(capacity)?,
            transmit: Self::zeroed(capacity)?,
            capacity,
            generation,
            transmit_on_loan: false,
        })
    }

    fn zeroed(bytes: usize) -> Result<Vec<u8>, MappingError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes)
            .map_err(|_| MappingError::AllocationFailed { bytes })?;
        buf.resize(bytes, 0);
        Ok(buf)
    }

    /// Size of each buffer in bytes
    pub fn capacity_bytes(&self) -> usize {
        self.capacity
    }

    /// Configuration generation this store belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Copy `bytes` into the back buffer at `offset`
    ///
    /// Rejects writes that would run past the end; the buffer is then unchanged.
    pub fn write_back(&mut self, offset: usize, bytes: &[u8]) -> Result<(), IngestError> {
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= self.capacity)
            .ok_or(IngestError::PayloadTooLarge {
                len: bytes.len(),
                capacity: self.capacity.saturating_sub(offset),
            })?;
        self.back[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Current back buffer contents
    pub fn back(&self) -> &[u8] {
        &self.back
    }

    /// Copy the back buffer into the transmit buffer
    pub fn snapshot_to_transmit(&mut self) {
        debug_assert!(
            !self.transmit_on_loan,
            "snapshot while the transmit buffer is being read"
        );
        if !self.transmit_on_loan {
            self.transmit.copy_from_slice(&self.back);
        }
    }

    /// Lend the transmit buffer to the transfer task
    pub fn checkout_transmit(&mut self) -> Option<Vec<u8>> {
        if self.transmit_on_loan {
            return None;
        }
        self.transmit_on_loan = true;
        Some(std::mem::take(&mut self.transmit))
    }

    /// Take back a buffer lent by [`checkout_transmit`](Self::checkout_transmit)
    ///
    /// Returns `false` and drops the buffer if it does not belong to this store.
    pub fn restore_transmit(&mut self, buffer: Vec<u8>, generation: u64) -> bool {
        if !self.transmit_on_loan || generation != self.generation || buffer.len() != self.capacity
        {
            return false;
        }
        self.transmit = buffer;
        self.transmit_on_loan = false;
        true
    }

    /// Whether the transfer task currently holds the transmit buffer
    pub fn transmit_on_loan(&self) -> bool {
        self.transmit_on_loan
    }
}
