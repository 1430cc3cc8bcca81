//! # pixelbridge: multi-channel LED controller bridge
//!
//! Drives arrays of addressable LEDs attached to a controller with a fixed
//! number of fixed-capacity output channels. Pixel-update messages arrive as
//! one flat frame; a compiled channel mapping scatters that frame across the
//! controller's channels, and a background transfer task pushes it to the
//! hardware.
//!
//! ## Architecture
//!
//! - **Mapping**: Compiles range descriptors into channel-bounded slices
//! - **Device**: Double-buffered frame store, ingestion path and transfer task
//! - **Transport**: Hardware interface the transfer task pushes frames to
//! - **OPC**: Open Pixel Control stream codec
//! - **Communication**: Crossbeam channels carry transfer events to the owner
//!
//! The transfer pipeline is latest-frame-wins: while a frame is being pushed,
//! newer frames coalesce into a single pending publish and the newest one is
//! sent as soon as the hardware is free.
//!
//! ## Example
//!
//! ```ignore
//! use pixelbridge::{
//!     config::DeviceConfig,
//!     device::DeviceRegistry,
//!     mapping::RangeDescriptor,
//!     opc::OpcMessage,
//!     transport::TracingTransport,
//! };
//!
//! let registry = DeviceRegistry::with_builtin();
//! let mut device = registry.create(&DeviceConfig::new("innocore"), Box::new(TracingTransport::new()))?;
//! device.load_mapping(&[RangeDescriptor::new(0, 0, 0, 128)])?;
//! device.open()?;
//!
//! device.write_message(&OpcMessage::set_pixels(0, vec![255; 128 * 3]))?;
//! device.close()?;
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod opc;
pub mod transport;
pub mod types;

pub use error::{BridgeError, IngestError, MappingError, Result, TransportError};
pub use types::*;
