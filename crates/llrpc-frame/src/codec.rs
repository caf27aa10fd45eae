use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, FrameError, Result};

/// Frame header: type word (2) + length (4) + message ID (4) = 10 bytes.
pub const HEADER_SIZE: usize = 10;

/// LLRP 1.0.1.
pub const LLRP_VERSION_1: u8 = 1;

/// LLRP 1.1.
pub const LLRP_VERSION_2: u8 = 2;

/// Default maximum frame size (header included): 1 MiB.
pub const DEFAULT_MAX_FRAME: usize = 1024 * 1024;

const TYPE_MASK: u16 = 0x03FF;
const VERSION_SHIFT: u16 = 10;
const RESERVED_SHIFT: u16 = 13;

/// The fixed LLRP message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// The three reserved high bits. Must be zero on the wire.
    pub reserved: u8,
    /// Protocol version (3 bits).
    pub version: u8,
    /// Message type (10 bits).
    pub message_type: u16,
    /// Total frame length, header included.
    pub length: u32,
    /// Message ID used to correlate requests and responses.
    pub message_id: u32,
}

impl FrameHeader {
    /// Parse a header from the first [`HEADER_SIZE`] bytes of `src`.
    ///
    /// Returns `None` if fewer than [`HEADER_SIZE`] bytes are available.
    pub fn parse(src: &[u8]) -> Option<Self> {
        if src.len() < HEADER_SIZE {
            return None;
        }
        let mut cursor = &src[..HEADER_SIZE];
        let word = cursor.get_u16();
        let length = cursor.get_u32();
        let message_id = cursor.get_u32();
        Some(Self {
            reserved: (word >> RESERVED_SHIFT) as u8,
            version: ((word >> VERSION_SHIFT) & 0x07) as u8,
            message_type: word & TYPE_MASK,
            length,
            message_id,
        })
    }

    /// Body length implied by the declared total length.
    pub fn body_len(&self) -> usize {
        (self.length as usize).saturating_sub(HEADER_SIZE)
    }

    fn put(&self, dst: &mut BytesMut) {
        let word = (u16::from(self.reserved & 0x07) << RESERVED_SHIFT)
            | (u16::from(self.version & 0x07) << VERSION_SHIFT)
            | (self.message_type & TYPE_MASK);
        dst.put_u16(word);
        dst.put_u32(self.length);
        dst.put_u32(self.message_id);
    }
}

/// A complete frame as cut from the stream, body not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// The decoded header.
    pub header: FrameHeader,
    /// Exactly `header.length - HEADER_SIZE` body bytes.
    pub body: Bytes,
}

impl RawFrame {
    /// The total wire size of this frame (header + body).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬─────────┬──────────────┬──────────────┬──────────────┬──────────────┐
/// │ Rsvd │ Version │ Message Type │ Length       │ Message ID   │ Body         │
/// │ (3b) │ (3b)    │ (10b)        │ (4B BE)      │ (4B BE)      │              │
/// └──────┴─────────┴──────────────┴──────────────┴──────────────┴──────────────┘
/// ```
pub fn encode_frame(
    version: u8,
    message_type: u16,
    message_id: u32,
    body: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let total = HEADER_SIZE + body.len();
    let length = u32::try_from(total).map_err(|_| FrameError::FrameTooLarge {
        size: total,
        max: u32::MAX as usize,
    })?;
    dst.reserve(total);
    FrameHeader {
        reserved: 0,
        version,
        message_type,
        length,
        message_id,
    }
    .put(dst);
    dst.put_slice(body);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes exactly the declared frame length from the buffer.
/// A declared length shorter than the header or above `max_frame` is an
/// error: the stream cannot be resynchronized after either.
pub fn decode_frame(src: &mut BytesMut, max_frame: usize) -> Result<Option<RawFrame>> {
    let Some(header) = FrameHeader::parse(src) else {
        return Ok(None); // Need more data
    };

    let total = header.length as usize;
    if total < HEADER_SIZE {
        return Err(DecodeError::MalformedEnvelope(format!(
            "declared length {total} shorter than {HEADER_SIZE}-byte header"
        ))
        .into());
    }
    if total > max_frame {
        return Err(FrameError::FrameTooLarge {
            size: total,
            max: max_frame,
        });
    }

    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let body = src.split_to(total - HEADER_SIZE).freeze();

    Ok(Some(RawFrame { header, body }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum frame size in bytes, header included. Default: 1 MiB.
    pub max_frame_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
