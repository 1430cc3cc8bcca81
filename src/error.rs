//! Error handling for pixelbridge
//!
//! The core has three error families, one per concern:
//!
//! - [`MappingError`] - a mapping configuration could not be compiled or
//!   backed by frame storage. Fatal to the mapping, never to the process.
//! - [`IngestError`] - a single pixel-update message was rejected. The message
//!   is dropped and the back buffer is left as it was.
//! - [`TransportError`] - the hardware transport failed to push or commit a
//!   frame. Reported to the device owner; the transfer task keeps running.
//!
//! [`BridgeError`] wraps all of them for the outer layers (configuration,
//! device registry, binary).

use thiserror::Error;

/// Errors raised while compiling a channel mapping or sizing its buffers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// A descriptor starts past the last slot of the last channel
    #[error("range {descriptor}: output slot {slot} is outside the controller (limit {limit})")]
    SlotOutOfRange {
        /// Index of the offending descriptor
        descriptor: usize,
        /// Requested first output slot
        slot: u32,
        /// `channel_capacity * max_channels`
        limit: u64,
    },

    /// A descriptor walks off either end of the channel list
    #[error("range {descriptor}: needs output channel {channel}, which does not exist")]
    ChannelOverrun {
        /// Index of the offending descriptor
        descriptor: usize,
        /// The channel index the range would have continued into
        channel: i64,
    },

    /// Frame storage could not be reserved
    #[error("failed to allocate {bytes} bytes of frame storage")]
    AllocationFailed {
        /// Requested size of one buffer
        bytes: usize,
    },

    /// No LED mapping is available (nothing mapped, or nothing loaded yet)
    #[error("no LED mapping available")]
    NotReady,

    /// A descriptor names a logical input channel other than 0
    #[error("range {descriptor}: unsupported input channel {channel}")]
    UnsupportedInputChannel {
        /// Index of the offending descriptor
        descriptor: usize,
        /// Requested input channel
        channel: u32,
    },
}

/// Errors raised while ingesting a pixel-update message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Only logical input channel 0 is accepted
    #[error("unsupported input channel {0}")]
    UnsupportedChannel(u32),

    /// The payload does not fit in the frame store
    #[error("payload of {len} bytes exceeds frame capacity of {capacity} bytes")]
    PayloadTooLarge {
        /// Payload length in bytes
        len: usize,
        /// Frame store capacity in bytes
        capacity: usize,
    },

    /// The device has no usable mapping
    #[error("no LED mapping available")]
    NotReady,
}

/// Opaque failure reported by a hardware transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    /// Create a transport error with a human readable message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message supplied by the transport
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Main error type for pixelbridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Mapping could not be compiled or allocated
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// A pixel-update message was rejected
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Hardware transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to device creation and lifecycle
    #[error("Device error: {0}")]
    Device(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<BridgeError>,
    },
}

impl BridgeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        BridgeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for pixelbridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<BridgeError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
