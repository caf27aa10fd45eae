//! LLRP message framing and binary parameter codec.
//!
//! Every LLRP message is framed with a fixed 10-byte header:
//! - 3 reserved bits, a 3-bit protocol version and a 10-bit message type
//! - a 4-byte big-endian length covering header and body
//! - a 4-byte big-endian message ID
//!
//! The body is a per-type block of fixed fields followed by a tree of
//! TV/TLV parameters. [`FrameReader`] hands out complete frames regardless
//! of how the bytes arrive; [`Message`] decodes and validates them.

pub mod codec;
pub mod error;
pub mod message;
pub mod message_type;
pub mod param;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::LlrpCodec;
pub use codec::{
    decode_frame, encode_frame, FrameConfig, FrameHeader, RawFrame, DEFAULT_MAX_FRAME,
    HEADER_SIZE, LLRP_VERSION_1, LLRP_VERSION_2,
};
pub use error::{DecodeError, FrameError, Result};
pub use message::Message;
pub use message_type::MessageType;
pub use param::Parameter;
pub use reader::FrameReader;
pub use writer::FrameWriter;
