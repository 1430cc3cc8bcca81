//! Transfer Task Implementation
//!
//! This module contains the pipeline state shared between a device's
//! ingestion path and its background transfer thread, and the loop that
//! runs on that thread.
//!
//! # State machine
//!
//! ```text
//!            publish                      transfer done, nothing pending
//!   Idle ─────────────► InFlight ─────────────────────────────────────► Idle
//!                        │    ▲
//!               publish  │    │ transfer done: snapshot again, send at once
//!                        ▼    │
//!                       Pending   (further publishes coalesce here)
//! ```
//!
//! All flags and both buffers live behind one mutex. The task sleeps on a
//! condition variable while idle and releases the lock for the duration of a
//! hardware push, holding the transmit buffer on loan from the frame store.
//!
//! # Reporting
//!
//! Completed and failed transfers are reported as [`TransferEvent`]s on a
//! bounded channel. Sending never blocks the task: when the owner falls
//! behind, events are dropped and counted in [`TransferStats::dropped_events`].

use super::frame_store::FrameStore;
use crate::error::TransportError;
use crate::mapping::{ChannelFrames, CompiledMapping};
use crate::transport::LedTransport;
use crate::types::{ChannelGeometry, PipelinePhase, TransferStats};
use crossbeam_channel::Sender;
use std::collections::BTreeSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Events reported by the transfer task to the device owner
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// A frame was pushed and committed
    FrameSent {
        /// Transfer sequence number, starting at 1
        sequence: u64,
        /// Number of channels pushed
        channels: usize,
        /// Wall time spent in the transport
        duration: Duration,
    },
    /// The transport rejected a frame; the task keeps running
    TransportFailed {
        /// Transfer sequence number
        sequence: u64,
        /// Error reported by the transport
        error: TransportError,
    },
    /// The transfer task has exited
    Stopped,
}

/// Result of a publish request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A snapshot was taken and the task signalled
    Started,
    /// A transfer is in flight; the frame will follow it
    Deferred,
    /// A frame was already waiting; it was superseded
    Coalesced,
}

/// Mapping and buffers installed together by a configuration
#[derive(Debug)]
pub(crate) struct InstalledFrame {
    pub(crate) mapping: Arc<CompiledMapping>,
    pub(crate) store: FrameStore,
}

/// Pipeline state guarded by the [`Shared`] mutex
#[derive(Debug, Default)]
pub(crate) struct PipelineState {
    pub(crate) running: bool,
    pub(crate) in_flight: bool,
    pub(crate) pending: bool,
    pub(crate) frame: Option<InstalledFrame>,
    pub(crate) stats: TransferStats,
    sequence: u64,
}

impl PipelineState {
    /// Observable phase; exactly one holds at a time
    pub(crate) fn phase(&self) -> PipelinePhase {
        if self.pending {
            PipelinePhase::Pending
        } else if self.in_flight {
            PipelinePhase::InFlight
        } else {
            PipelinePhase::Idle
        }
    }

    /// Publish the back buffer, or mark it pending behind the current transfer.
    ///
    /// Callers must notify the task when this returns [`PublishOutcome::Started`].
    pub(crate) fn publish(&mut self) -> PublishOutcome {
        if self.in_flight {
            let outcome = if self.pending {
                self.stats.frames_coalesced += 1;
                PublishOutcome::Coalesced
            } else {
                self.stats.frames_deferred += 1;
                PublishOutcome::Deferred
            };
            self.pending = true;
            return outcome;
        }

        self.start_transfer();
        self.stats.frames_published += 1;
        PublishOutcome::Started
    }

    /// Start a transfer for a frame left pending while the task was stopped
    pub(crate) fn flush(&mut self) -> bool {
        if !self.pending || self.in_flight || self.frame.is_none() {
            return false;
        }
        self.pending = false;
        self.start_transfer();
        self.stats.frames_published += 1;
        true
    }

    /// Snapshot the back buffer and mark a transfer in flight
    fn start_transfer(&mut self) {
        if let Some(frame) = self.frame.as_mut() {
            frame.store.snapshot_to_transmit();
            self.in_flight = true;
        }
    }

    /// Replace mapping and buffers.
    ///
    /// A transfer already running keeps its own transmit buffer and mapping;
    /// they are discarded when it finishes.
    pub(crate) fn install(&mut self, frame: Option<InstalledFrame>) {
        let on_loan = self
            .frame
            .as_ref()
            .is_some_and(|f| f.store.transmit_on_loan());
        self.frame = frame;
        self.pending = false;
        if !on_loan {
            self.in_flight = false;
        }
    }

    /// Lend the transmit buffer and mapping to the task
    fn checkout(&mut self) -> Option<TransferJob> {
        let frame = self.frame.as_mut()?;
        let transmit = frame.store.checkout_transmit()?;
        self.sequence += 1;
        Some(TransferJob {
            sequence: self.sequence,
            generation: frame.store.generation(),
            mapping: Arc::clone(&frame.mapping),
            transmit,
        })
    }

    /// Return the buffer and drain a pending publish.
    ///
    /// Returns `true` when a coalesced frame is ready to send immediately.
    fn complete(&mut self, transmit: Vec<u8>, generation: u64) -> bool {
        if let Some(frame) = self.frame.as_mut() {
            if !frame.store.restore_transmit(transmit, generation) {
                tracing::debug!(generation, "Discarded transmit buffer of replaced mapping");
            }
        }
        self.in_flight = false;

        if self.pending && self.running {
            self.pending = false;
            self.start_transfer();
            return self.in_flight;
        }
        false
    }
}

/// State shared by a device and its transfer task
#[derive(Debug, Default)]
pub(crate) struct Shared {
    state: Mutex<PipelineState>,
    wake: Condvar,
}

impl Shared {
    /// Lock the pipeline state
    ///
    /// A poisoned lock is recovered: every critical section leaves the state
    /// structurally valid.
    pub(crate) fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake the transfer task
    pub(crate) fn notify(&self) {
        self.wake.notify_one();
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, PipelineState>) -> MutexGuard<'a, PipelineState> {
        self.wake.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything the task needs to push one frame without holding the lock
struct TransferJob {
    sequence: u64,
    generation: u64,
    mapping: Arc<CompiledMapping>,
    transmit: Vec<u8>,
}

/// The transfer task that runs on a device's background thread
pub(crate) struct TransferWorker {
    /// Device name, for logs
    name: String,
    /// Shared pipeline state
    shared: Arc<Shared>,
    /// Hardware transport (moved in on start, handed back on exit)
    transport: Box<dyn LedTransport>,
    /// Event sender to the device owner
    events: Sender<TransferEvent>,
    /// Rendered per-channel output
    frames: ChannelFrames,
    /// Generation of the mapping last rendered into `frames`
    rendered_generation: Option<u64>,
    /// Channels whose hardware may still show data from the last push
    lit_channels: BTreeSet<u32>,
}

impl TransferWorker {
    /// Create a new transfer worker
    pub(crate) fn new(
        name: String,
        shared: Arc<Shared>,
        transport: Box<dyn LedTransport>,
        events: Sender<TransferEvent>,
        geometry: &ChannelGeometry,
    ) -> Self {
        Self {
            name,
            shared,
            transport,
            events,
            frames: ChannelFrames::new(geometry),
            rendered_generation: None,
            lit_channels: BTreeSet::new(),
        }
    }

    /// Run the transfer loop until the device shuts down.
    ///
    /// Returns the transport so the device can be reopened.
    pub(crate) fn run(mut self) -> Box<dyn LedTransport> {
        tracing::info!(device = %self.name, transport = self.transport.kind(), "Transfer task started");

        let shared = Arc::clone(&self.shared);
        let mut state = shared.lock();
        loop {
            while state.running && !state.in_flight {
                state = shared.wait(state);
            }
            if !state.running {
                break;
            }

            let Some(job) = state.checkout() else {
                // Nothing to read: the mapping was removed under us
                state.in_flight = false;
                continue;
            };
            drop(state);

            let started = Instant::now();
            let result = self.transfer(&job);
            let elapsed = started.elapsed();

            state = shared.lock();
            let event = match result {
                Ok(channels) => {
                    state.stats.record_success(elapsed.as_micros() as u64);
                    TransferEvent::FrameSent {
                        sequence: job.sequence,
                        channels,
                        duration: elapsed,
                    }
                }
                Err(error) => {
                    state.stats.record_failure();
                    tracing::error!(device = %self.name, sequence = job.sequence, "Transfer failed: {}", error);
                    TransferEvent::TransportFailed {
                        sequence: job.sequence,
                        error,
                    }
                }
            };
            if self.events.try_send(event).is_err() {
                state.stats.dropped_events += 1;
            }

            if state.complete(job.transmit, job.generation) {
                tracing::trace!(device = %self.name, "Sending coalesced frame");
            }
        }
        drop(state);

        if self.events.try_send(TransferEvent::Stopped).is_err() {
            shared.lock().stats.dropped_events += 1;
        }
        tracing::info!(device = %self.name, "Transfer task stopped");
        self.transport
    }

    /// Render the job's frame and push it channel by channel
    ///
    /// Channels lit by an earlier mapping but not by this one are pushed
    /// blank until a push of them succeeds.
    fn transfer(&mut self, job: &TransferJob) -> Result<usize, TransportError> {
        if self.rendered_generation != Some(job.generation) {
            // Slots the new mapping does not cover must go dark
            self.frames.clear();
            self.rendered_generation = Some(job.generation);
        }
        job.mapping.render_into(&job.transmit, &mut self.frames);

        self.lit_channels
            .extend(job.mapping.output_channels.iter().copied());
        let mut pushed = 0;
        for &channel in &self.lit_channels {
            if let Some(data) = self.frames.channel(channel) {
                self.transport.push(channel, data)?;
                pushed += 1;
            }
        }
        self.transport.commit()?;

        self.lit_channels = job.mapping.output_channels.iter().copied().collect();
        Ok(pushed)
    }
}
