//! Streaming envelope framing.
//!
//! Every message on a streaming direction travels in an envelope:
//!
//! ```text
//! [flags:1][length:4][payload:length]
//! ```
//!
//! A direction is closed by a final envelope with the END_STREAM flag. The
//! EndStream payload is JSON: `{}` on success, `{"error": {...}}` on failure.

use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{EnvelopeError, Status};

/// Envelope flags.
pub mod envelope_flags {
    /// Regular message.
    pub const MESSAGE: u8 = 0x00;
    /// Compressed message. Never produced here, rejected on read.
    pub const COMPRESSED: u8 = 0x01;
    /// End of stream.
    pub const END_STREAM: u8 = 0x02;
}

/// Envelope header size (flags + length).
pub const ENVELOPE_HEADER_SIZE: usize = 5;

/// Default upper bound on a single frame payload.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Wrap a message payload in an envelope.
pub fn wrap_envelope(payload: &[u8]) -> Bytes {
    frame(envelope_flags::MESSAGE, payload)
}

fn frame(flags: u8, payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(ENVELOPE_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&[flags]);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame.freeze()
}

/// Parse an envelope header. Returns `(flags, length)`.
pub fn parse_envelope_header(data: &[u8]) -> Result<(u8, u32), EnvelopeError> {
    if data.len() < ENVELOPE_HEADER_SIZE {
        return Err(EnvelopeError::IncompleteHeader {
            expected: ENVELOPE_HEADER_SIZE,
            actual: data.len(),
        });
    }

    let flags = data[0];
    let length = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);

    Ok((flags, length))
}

/// JSON payload of an EndStream frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndStream {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Status>,
}

impl EndStream {
    /// Successful end of a direction.
    pub fn ok() -> Self {
        Self { error: None }
    }

    /// End of a direction carrying a failure outcome.
    pub fn failed(status: Status) -> Self {
        Self {
            error: Some(status),
        }
    }

    /// Encode as a complete EndStream envelope.
    pub fn to_frame(&self) -> Bytes {
        // A struct of an optional plain status cannot fail to serialize.
        let json = serde_json::to_vec(self).unwrap_or_else(|_| b"{}".to_vec());
        frame(envelope_flags::END_STREAM, &json)
    }

    /// Parse an EndStream payload. An empty payload counts as success.
    pub fn parse(payload: &[u8]) -> Result<Self, EnvelopeError> {
        if payload.is_empty() {
            return Ok(Self::ok());
        }
        serde_json::from_slice(payload).map_err(|e| EnvelopeError::InvalidEndStream(e.to_string()))
    }

    /// Convert into the outcome it reports.
    pub fn into_result(self) -> Result<(), Status> {
        match self.error {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }
}

/// One decoded envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A message payload, still serialized.
    Message(Bytes),
    /// The end of the direction.
    EndStream(EndStream),
}

/// Incremental envelope reader.
///
/// Bytes arrive in arbitrary chunks; [`push`](FrameReader::push) buffers them
/// and [`next_frame`](FrameReader::next_frame) yields each complete envelope
/// in order.
#[derive(Debug)]
pub struct FrameReader {
    buffer: BytesMut,
    max_frame_size: usize,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl FrameReader {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_frame_size,
        }
    }

    /// Append received bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Number of buffered bytes not yet consumed as a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Take the next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, EnvelopeError> {
        if self.buffer.len() < ENVELOPE_HEADER_SIZE {
            return Ok(None);
        }

        let (flags, length) = parse_envelope_header(&self.buffer)?;
        let length = length as usize;
        if length > self.max_frame_size {
            return Err(EnvelopeError::TooLarge {
                size: length,
                limit: self.max_frame_size,
            });
        }
        if self.buffer.len() < ENVELOPE_HEADER_SIZE + length {
            return Ok(None);
        }

        self.buffer.advance(ENVELOPE_HEADER_SIZE);
        let payload = self.buffer.split_to(length).freeze();

        match flags {
            envelope_flags::MESSAGE => Ok(Some(Frame::Message(payload))),
            envelope_flags::END_STREAM => Ok(Some(Frame::EndStream(EndStream::parse(&payload)?))),
            other => Err(EnvelopeError::InvalidFlags(other)),
        }
    }

    /// Call once the byte stream has ended. Fails if a partial frame remains.
    pub fn finish(&self) -> Result<(), EnvelopeError> {
        if self.buffer.is_empty() {
            Ok(())
        } else {
            Err(EnvelopeError::Truncated(self.buffer.len()))
        }
    }
}
