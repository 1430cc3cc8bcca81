//! LED device layer
//!
//! A device owns one compiled channel mapping, its frame store, and a
//! background transfer task that pushes frames to an [`LedTransport`].
//!
//! # Architecture
//!
//! ```text
//!   OPC message ──► write_message ──► ingest ──► back buffer
//!                                                   │ publish
//!                                                   ▼
//!                                             transmit buffer ──► TransferWorker ──► LedTransport
//!                                                                        │
//!                                                                        └──► TransferEvent channel
//! ```
//!
//! Devices are created through the [`DeviceRegistry`], which maps a
//! configuration `type` string to a factory. Callers only see the
//! [`LedDevice`] trait.
//!
//! [`LedTransport`]: crate::transport::LedTransport

pub mod controller;
pub mod frame_store;
pub mod registry;
pub mod transfer;

pub use controller::{ChannelController, DEFAULT_EVENT_QUEUE_DEPTH};
pub use frame_store::FrameStore;
pub use registry::{DeviceFactory, DeviceKindInfo, DeviceRegistry};
pub use transfer::{PublishOutcome, TransferEvent};

use crate::error::{IngestError, MappingError, Result};
use crate::mapping::RangeDescriptor;
use crate::opc::OpcMessage;
use crate::types::{ChannelGeometry, PipelinePhase, TransferStats};
use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use serde::Serialize;

/// What a device did with an OPC message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Disposition {
    /// The message updated the frame
    Applied,
    /// The message was understood but has no effect on this device
    PassThrough,
}

/// Serializable snapshot of a device
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDescription {
    /// Registry type string
    pub kind: String,
    /// Device name
    pub name: String,
    /// Controller geometry
    pub geometry: ChannelGeometry,
    /// Whether the transfer task is running
    pub running: bool,
    /// Whether a mapping and frame store are installed
    pub mapping_available: bool,
    /// Pixels covered by the last mapping that compiled
    pub mapped_pixels: u64,
    /// Output channels touched by the last mapping that compiled
    pub output_channels: Vec<u32>,
    /// Why the last mapping could not be installed
    pub last_mapping_error: Option<String>,
    /// Current pipeline phase
    pub phase: PipelinePhase,
    /// When the device was last opened
    pub opened_at: Option<DateTime<Utc>>,
    /// Transfer statistics
    pub stats: TransferStats,
}

/// Capability interface of an LED output device
///
/// Implementations are driven from a single owner thread; the frame transfer
/// itself happens on a thread the device manages.
pub trait LedDevice: Send {
    /// Device name, for logs
    fn name(&self) -> &str;

    /// Start the transfer task
    fn open(&mut self) -> Result<()>;

    /// Compile `descriptors` and replace the mapping and frame store.
    ///
    /// On error the device holds no mapping and every ingest fails with
    /// [`IngestError::NotReady`] until a mapping loads.
    fn load_mapping(&mut self, descriptors: &[RangeDescriptor])
        -> std::result::Result<(), MappingError>;

    /// Dispatch one OPC message
    fn write_message(&mut self, message: &OpcMessage)
        -> std::result::Result<Disposition, IngestError>;

    /// Send a frame that is waiting, if the pipeline is free.
    ///
    /// Returns `true` when a transfer was started.
    fn flush(&mut self) -> bool;

    /// Snapshot of the device state
    fn describe(&self) -> DeviceDescription;

    /// Stop and join the transfer task
    fn close(&mut self) -> Result<()>;

    /// Receiver for transfer events
    fn events(&self) -> Receiver<TransferEvent>;
}
