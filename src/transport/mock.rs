//! Mock Transport Implementation for Testing
//!
//! This module provides an in-memory LED transport that can be used to run
//! the full device pipeline without hardware. It records every committed
//! frame so tests can assert exactly what would have reached the LEDs.
//!
//! # Features
//!
//! - **Frame recording**: each `commit` stores the channels pushed since the
//!   previous commit
//! - **Commit gate**: optionally hold every commit until the test releases it,
//!   which pins the pipeline in its in-flight phase
//! - **Failure injection**: make the next N commits fail
//! - **Overlap detection**: tracks the highest number of frames ever being
//!   transferred at the same time
//!
//! # Example
//!
//! ```ignore
//! use pixelbridge::transport::MockTransport;
//!
//! let (transport, gate) = MockTransport::new().with_gate();
//! let handle = transport.handle();
//!
//! // ... open a device with `transport`, ingest frames ...
//!
//! gate.send(()).unwrap();                 // let one commit through
//! assert!(handle.wait_for_frames(1, Duration::from_secs(1)));
//! ```

use super::LedTransport;
use crate::error::TransportError;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A frame as it was committed to the mock controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedFrame {
    /// Commit order, starting at 0
    pub sequence: usize,
    /// `(channel, data)` pairs in push order
    pub channels: Vec<(u32, Vec<u8>)>,
}

impl CommittedFrame {
    /// Data pushed for a channel, if it was pushed
    pub fn channel(&self, channel: u32) -> Option<&[u8]> {
        self.channels
            .iter()
            .find(|(ch, _)| *ch == channel)
            .map(|(_, data)| data.as_slice())
    }
}

#[derive(Debug, Default)]
struct MockRecord {
    frames: Vec<CommittedFrame>,
    commits_started: usize,
    fail_next: usize,
}

#[derive(Debug, Default)]
struct MockShared {
    record: Mutex<MockRecord>,
    changed: Condvar,
    active_transfers: AtomicUsize,
    max_active_transfers: AtomicUsize,
}

impl MockShared {
    fn lock(&self) -> MutexGuard<'_, MockRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until `done` holds or the timeout passes
    fn wait_until<F>(&self, timeout: Duration, done: F) -> bool
    where
        F: Fn(&MockRecord) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut record = self.lock();
        while !done(&record) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            record = self
                .changed
                .wait_timeout(record, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// In-memory transport that records committed frames
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<MockShared>,
    staged: Vec<(u32, Vec<u8>)>,
    in_transfer: bool,
    gate: Option<Receiver<()>>,
    push_delay: Option<Duration>,
}

impl MockTransport {
    /// Create a new mock transport that commits immediately
    pub fn new() -> Self {
        Self {
            shared: Arc::new(MockShared::default()),
            staged: Vec::new(),
            in_transfer: false,
            gate: None,
            push_delay: None,
        }
    }

    /// Hold every commit until a token is sent on the returned sender.
    ///
    /// Dropping the sender releases all current and future commits.
    pub fn with_gate(mut self) -> (Self, Sender<()>) {
        let (tx, rx) = bounded(64);
        self.gate = Some(rx);
        (self, tx)
    }

    /// Sleep for `delay` inside every push, simulating a slow link
    pub fn with_push_delay(mut self, delay: Duration) -> Self {
        self.push_delay = Some(delay);
        self
    }

    /// Handle for inspecting the transport after it moved to another thread
    pub fn handle(&self) -> MockTransportHandle {
        MockTransportHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn enter_transfer(&mut self) {
        if self.in_transfer {
            return;
        }
        self.in_transfer = true;
        let active = self.shared.active_transfers.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared
            .max_active_transfers
            .fetch_max(active, Ordering::SeqCst);
    }

    fn exit_transfer(&mut self) {
        if self.in_transfer {
            self.in_transfer = false;
            self.shared.active_transfers.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LedTransport for MockTransport {
    fn push(&mut self, channel: u32, data: &[u8]) -> Result<(), TransportError> {
        self.enter_transfer();
        if let Some(delay) = self.push_delay {
            std::thread::sleep(delay);
        }
        self.staged.push((channel, data.to_vec()));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TransportError> {
        self.enter_transfer();
        {
            let mut record = self.shared.lock();
            record.commits_started += 1;
            self.shared.changed.notify_all();
        }

        if let Some(gate) = &self.gate {
            // A dropped sender releases the gate for good
            let _ = gate.recv();
        }

        let channels = std::mem::take(&mut self.staged);
        let result = {
            let mut record = self.shared.lock();
            let result = if record.fail_next > 0 {
                record.fail_next -= 1;
                Err(TransportError::new("injected commit failure"))
            } else {
                let sequence = record.frames.len();
                record.frames.push(CommittedFrame { sequence, channels });
                Ok(())
            };
            self.shared.changed.notify_all();
            result
        };

        self.exit_transfer();
        result
    }

    fn kind(&self) -> &'static str {
        "mock"
    }
}

/// Shared view of a [`MockTransport`]
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    shared: Arc<MockShared>,
}

impl MockTransportHandle {
    /// All frames committed so far
    pub fn frames(&self) -> Vec<CommittedFrame> {
        self.shared.lock().frames.clone()
    }

    /// Number of frames committed so far
    pub fn frame_count(&self) -> usize {
        self.shared.lock().frames.len()
    }

    /// Number of commits that have started (including ones held at the gate)
    pub fn commits_started(&self) -> usize {
        self.shared.lock().commits_started
    }

    /// Make the next `count` commits fail
    pub fn fail_next(&self, count: usize) {
        self.shared.lock().fail_next += count;
    }

    /// Highest number of overlapping transfers ever observed
    pub fn max_concurrent_transfers(&self) -> usize {
        self.shared.max_active_transfers.load(Ordering::SeqCst)
    }

    /// Number of transfers currently between first push and commit
    pub fn active_transfers(&self) -> usize {
        self.shared.active_transfers.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` frames are committed
    pub fn wait_for_frames(&self, count: usize, timeout: Duration) -> bool {
        self.shared
            .wait_until(timeout, |record| record.frames.len() >= count)
    }

    /// Wait until at least `count` commits have started
    pub fn wait_for_commits_started(&self, count: usize, timeout: Duration) -> bool {
        self.shared
            .wait_until(timeout, |record| record.commits_started >= count)
    }
}
