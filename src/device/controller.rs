//! Multi-channel LED controller device

use super::frame_store::FrameStore;
use super::transfer::{InstalledFrame, PublishOutcome, Shared, TransferEvent, TransferWorker};
use super::{DeviceDescription, Disposition, LedDevice};
use crate::error::{BridgeError, IngestError, MappingError, Result};
use crate::mapping::{CompiledMapping, MappingCompiler, RangeDescriptor, INPUT_CHANNEL};
use crate::opc::{OpcCommand, OpcMessage};
use crate::transport::LedTransport;
use crate::types::{ChannelGeometry, PipelinePhase, TransferStats};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Default depth of the transfer event queue
pub const DEFAULT_EVENT_QUEUE_DEPTH: usize = 256;

/// An LED controller with a fixed number of fixed-capacity output channels
///
/// Owns the mapping, the frame store and the transfer task. Ingestion runs
/// on the caller's thread; hardware pushes run on the task's thread.
pub struct ChannelController {
    kind: String,
    name: String,
    geometry: ChannelGeometry,
    shared: Arc<Shared>,
    /// Parked here while the task is not running
    transport: Option<Box<dyn LedTransport>>,
    worker: Option<JoinHandle<Box<dyn LedTransport>>>,
    events_tx: Sender<TransferEvent>,
    events_rx: Receiver<TransferEvent>,
    generation: u64,
    /// Last mapping that compiled; kept across a failed configure
    mapping: Option<Arc<CompiledMapping>>,
    opened_at: Option<DateTime<Utc>>,
    last_mapping_error: Option<MappingError>,
}

impl ChannelController {
    /// Create a device with no mapping and no running task
    ///
    /// # Arguments
    /// * `kind` - Registry type string
    /// * `name` - Device name, used for logs and the task's thread name
    /// * `geometry` - Controller shape
    /// * `transport` - Hardware transport, moved onto the task on start
    /// * `event_queue_depth` - Capacity of the transfer event queue
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        geometry: ChannelGeometry,
        transport: Box<dyn LedTransport>,
        event_queue_depth: usize,
    ) -> Self {
        let (events_tx, events_rx) = bounded(event_queue_depth.max(1));
        Self {
            kind: kind.into(),
            name: name.into(),
            geometry,
            shared: Arc::new(Shared::default()),
            transport: Some(transport),
            worker: None,
            events_tx,
            events_rx,
            generation: 0,
            mapping: None,
            opened_at: None,
            last_mapping_error: None,
        }
    }

    /// Controller geometry
    pub fn geometry(&self) -> ChannelGeometry {
        self.geometry
    }

    /// Compile a mapping and install it together with fresh frame storage.
    ///
    /// Any failure leaves the device inert: ingestion fails with
    /// [`IngestError::NotReady`] until a later call succeeds. The previous
    /// mapping stays reported by [`mapping`](Self::mapping).
    pub fn configure(
        &mut self,
        descriptors: &[RangeDescriptor],
    ) -> std::result::Result<Arc<CompiledMapping>, MappingError> {
        self.generation += 1;
        match self.build_frame(descriptors) {
            Ok(frame) => {
                let mapping = Arc::clone(&frame.mapping);
                tracing::info!(
                    device = %self.name,
                    ranges = descriptors.len(),
                    entries = mapping.entries.len(),
                    pixels = mapping.total_mapped_pixels,
                    channels = ?mapping.output_channels,
                    compile_us = mapping.stats.compile_time_us,
                    "LED mapping installed"
                );
                self.shared.lock().install(Some(frame));
                self.mapping = Some(Arc::clone(&mapping));
                self.last_mapping_error = None;
                Ok(mapping)
            }
            Err(e) => {
                tracing::warn!(device = %self.name, "no LED mapping available: {}", e);
                self.shared.lock().install(None);
                self.last_mapping_error = Some(e.clone());
                Err(e)
            }
        }
    }

    fn build_frame(
        &self,
        descriptors: &[RangeDescriptor],
    ) -> std::result::Result<InstalledFrame, MappingError> {
        if let Some((descriptor, range)) = descriptors
            .iter()
            .enumerate()
            .find(|(_, r)| r.channel != INPUT_CHANNEL)
        {
            return Err(MappingError::UnsupportedInputChannel {
                descriptor,
                channel: range.channel,
            });
        }

        let mapping = MappingCompiler::compile_for(descriptors, &self.geometry)?;
        let store = FrameStore::allocate(
            mapping.total_mapped_pixels,
            self.geometry.bytes_per_pixel,
            self.generation,
        )?;
        Ok(InstalledFrame {
            mapping: Arc::new(mapping),
            store,
        })
    }

    /// Start the transfer task
    ///
    /// Starting a running device is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        self.geometry
            .validate()
            .map_err(|e| e.with_context(format!("{}: opening device", self.name)))?;
        let transport = self
            .transport
            .take()
            .ok_or_else(|| BridgeError::Device(format!("{}: transport was lost", self.name)))?;

        let worker = TransferWorker::new(
            self.name.clone(),
            Arc::clone(&self.shared),
            transport,
            self.events_tx.clone(),
            &self.geometry,
        );

        self.shared.lock().running = true;
        let spawned = std::thread::Builder::new()
            .name(format!("pixelbridge-{}", self.name))
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                self.opened_at = Some(Utc::now());
                tracing::info!(device = %self.name, geometry = %self.geometry, "Device opened");
                Ok(())
            }
            Err(e) => {
                self.shared.lock().running = false;
                Err(BridgeError::from(e).with_context(format!("{}: spawning transfer task", self.name)))
            }
        }
    }

    /// Copy a pixel-update payload into the back buffer and publish it
    ///
    /// # Arguments
    /// * `channel` - Logical input channel; only channel 0 is accepted
    /// * `payload` - Pixel bytes for `back[0..payload.len())`
    pub fn ingest(&self, channel: u32, payload: &[u8]) -> std::result::Result<(), IngestError> {
        let mut state = self.shared.lock();

        let result = if channel != INPUT_CHANNEL {
            Err(IngestError::UnsupportedChannel(channel))
        } else if let Some(frame) = state.frame.as_mut() {
            frame.store.write_back(0, payload)
        } else {
            Err(IngestError::NotReady)
        };

        if let Err(e) = result {
            state.stats.ingest_rejected += 1;
            tracing::debug!(device = %self.name, "Rejected pixel update: {}", e);
            return Err(e);
        }

        if state.publish() == PublishOutcome::Started {
            drop(state);
            self.shared.notify();
        }
        Ok(())
    }

    /// Send a frame left waiting, if no transfer is running
    pub fn flush(&self) -> bool {
        let started = self.shared.lock().flush();
        if started {
            self.shared.notify();
        }
        started
    }

    /// Stop the transfer task and wait for it to exit
    ///
    /// A transfer already running completes first. Shutting down a stopped
    /// device is a no-op.
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };

        self.shared.lock().running = false;
        self.shared.notify();

        let transport = handle
            .join()
            .map_err(|_| BridgeError::Device(format!("{}: transfer task panicked", self.name)))?;
        self.transport = Some(transport);
        tracing::info!(device = %self.name, "Device closed");
        Ok(())
    }

    /// Whether the transfer task is running
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Current pipeline phase
    pub fn phase(&self) -> PipelinePhase {
        self.shared.lock().phase()
    }

    /// Snapshot of transfer statistics
    pub fn stats(&self) -> TransferStats {
        self.shared.lock().stats.clone()
    }

    /// Copy of the back buffer, if a mapping is installed
    pub fn back_buffer(&self) -> Option<Vec<u8>> {
        self.shared
            .lock()
            .frame
            .as_ref()
            .map(|frame| frame.store.back().to_vec())
    }

    /// Last mapping that compiled, whether or not it is still active
    pub fn mapping(&self) -> Option<Arc<CompiledMapping>> {
        self.mapping.clone()
    }
}

impl LedDevice for ChannelController {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<()> {
        self.start()
    }

    fn load_mapping(
        &mut self,
        descriptors: &[RangeDescriptor],
    ) -> std::result::Result<(), MappingError> {
        self.configure(descriptors).map(|_| ())
    }

    fn write_message(
        &mut self,
        message: &OpcMessage,
    ) -> std::result::Result<Disposition, IngestError> {
        match message.command {
            OpcCommand::SetPixelColors => {
                self.ingest(u32::from(message.channel), &message.data)?;
                Ok(Disposition::Applied)
            }
            OpcCommand::SystemExclusive => {
                match message.sysex_id() {
                    Some(id) => tracing::debug!(device = %self.name, id, "SysEx command"),
                    None => tracing::debug!(device = %self.name, "SysEx message too short"),
                }
                Ok(Disposition::PassThrough)
            }
            OpcCommand::Other(code) => {
                tracing::debug!(device = %self.name, command = code, "Unhandled OPC command");
                Ok(Disposition::PassThrough)
            }
        }
    }

    fn flush(&mut self) -> bool {
        ChannelController::flush(self)
    }

    fn describe(&self) -> DeviceDescription {
        let state = self.shared.lock();
        let mapping = self.mapping.as_ref();
        DeviceDescription {
            kind: self.kind.clone(),
            name: self.name.clone(),
            geometry: self.geometry,
            running: state.running,
            mapping_available: state.frame.is_some(),
            mapped_pixels: mapping.map_or(0, |m| m.total_mapped_pixels),
            output_channels: mapping.map(|m| m.output_channels.clone()).unwrap_or_default(),
            last_mapping_error: self.last_mapping_error.as_ref().map(ToString::to_string),
            phase: state.phase(),
            opened_at: self.opened_at,
            stats: state.stats.clone(),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.shutdown()
    }

    fn events(&self) -> Receiver<TransferEvent> {
        self.events_rx.clone()
    }
}

impl Drop for ChannelController {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!("Failed to stop device on drop: {}", e);
        }
    }
}

impl std::fmt::Debug for ChannelController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelController")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("geometry", &self.geometry)
            .field("running", &self.worker.is_some())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
