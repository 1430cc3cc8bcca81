//! Open Pixel Control (OPC) messages
//!
//! Every message is a four byte header followed by the payload:
//!
//! ```text
//! | channel | command | len_hi | len_lo | data[len] ... |
//! ```
//!
//! Command 0 sets pixel colors (RGB triples); command 0xFF is a system
//! exclusive message whose first four data bytes are a big-endian system id.

use bytes::{Buf, BufMut, BytesMut};
use std::io::{self, ErrorKind, Read, Write};

/// Size of the message header in bytes
pub const HEADER_LEN: usize = 4;

/// Largest payload a message can carry
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// OPC command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcCommand {
    /// 0x00: set pixel colors
    SetPixelColors,
    /// 0xFF: vendor specific
    SystemExclusive,
    /// Any other command byte
    Other(u8),
}

impl OpcCommand {
    /// Wire value
    pub fn code(self) -> u8 {
        match self {
            OpcCommand::SetPixelColors => 0x00,
            OpcCommand::SystemExclusive => 0xFF,
            OpcCommand::Other(code) => code,
        }
    }
}

impl From<u8> for OpcCommand {
    fn from(code: u8) -> Self {
        match code {
            0x00 => OpcCommand::SetPixelColors,
            0xFF => OpcCommand::SystemExclusive,
            other => OpcCommand::Other(other),
        }
    }
}

/// One decoded OPC message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcMessage {
    pub channel: u8,
    pub command: OpcCommand,
    pub data: Vec<u8>,
}

impl OpcMessage {
    pub fn new(channel: u8, command: OpcCommand, data: Vec<u8>) -> Self {
        Self {
            channel,
            command,
            data,
        }
    }

    /// Set-pixel-colors message for `channel`
    pub fn set_pixels(channel: u8, data: Vec<u8>) -> Self {
        Self::new(channel, OpcCommand::SetPixelColors, data)
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// System id of a SysEx message, if the payload carries one
    pub fn sysex_id(&self) -> Option<u32> {
        let id: [u8; 4] = self.data.get(..4)?.try_into().ok()?;
        Some(u32::from_be_bytes(id))
    }

    /// Wire form of the message
    ///
    /// Fails with `InvalidInput` when the payload exceeds [`MAX_PAYLOAD_LEN`].
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len());
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Append the wire form to `dst`
    pub fn encode_into<B: BufMut>(&self, dst: &mut B) -> io::Result<()> {
        let len = u16::try_from(self.data.len()).map_err(|_| {
            io::Error::new(
                ErrorKind::InvalidInput,
                format!("OPC payload of {} bytes is too long", self.data.len()),
            )
        })?;
        dst.put_u8(self.channel);
        dst.put_u8(self.command.code());
        dst.put_u16(len);
        dst.put_slice(&self.data);
        Ok(())
    }

    /// Decode one message from the front of `src`.
    ///
    /// Returns `None` if `src` doesn't hold a complete message yet. On
    /// success the message bytes are consumed from the buffer.
    pub fn decode(src: &mut BytesMut) -> Option<Self> {
        if src.len() < HEADER_LEN {
            return None;
        }
        let len = usize::from(u16::from_be_bytes([src[2], src[3]]));
        if src.len() < HEADER_LEN + len {
            return None;
        }

        let channel = src.get_u8();
        let command = OpcCommand::from(src.get_u8());
        src.advance(2);
        let data = src.split_to(len).to_vec();
        Some(Self::new(channel, command, data))
    }

    /// Write the wire form to `writer`
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.encode()?)
    }
}

/// Blocking decoder over a byte stream
///
/// Handles partial reads internally; callers always get complete messages.
#[derive(Debug)]
pub struct OpcReader<R> {
    inner: R,
    buf: BytesMut,
    messages: u64,
}

impl<R: Read> OpcReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            messages: 0,
        }
    }

    /// Number of messages decoded so far
    pub fn messages_read(&self) -> u64 {
        self.messages
    }

    /// Read the next message
    ///
    /// Returns `Ok(None)` at end of stream on a message boundary. A stream
    /// that ends inside a message is an `UnexpectedEof` error.
    pub fn read_message(&mut self) -> io::Result<Option<OpcMessage>> {
        loop {
            if let Some(message) = OpcMessage::decode(&mut self.buf) {
                self.messages += 1;
                return Ok(Some(message));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            if read == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let place = if self.buf.len() < HEADER_LEN {
                    "header"
                } else {
                    "payload"
                };
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("stream ended inside an OPC {}", place),
                ));
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Unwrap the underlying reader
    ///
    /// Bytes already read but not yet decoded are lost.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Iterator for OpcReader<R> {
    type Item = io::Result<OpcMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_message().transpose()
    }
}
