//! `tokio_util::codec` adapter for LLRP messages.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, DEFAULT_MAX_FRAME};
use crate::error::{FrameError, Result};
use crate::message::Message;

/// Frames and decodes LLRP messages for `tokio_util::codec::Framed`.
///
/// Applies the same rules as [`crate::FrameReader`]: frames are cut at
/// their declared length first, then the body is validated.
#[derive(Debug, Clone)]
pub struct LlrpCodec {
    max_frame_size: usize,
}

impl LlrpCodec {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for LlrpCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LlrpCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        match decode_frame(src, self.max_frame_size)? {
            Some(frame) => Ok(Some(Message::from_frame(frame)?)),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionLost {
                buffered: src.len(),
            }),
        }
    }
}

impl Encoder<Message> for LlrpCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        let size = item.encoded_len();
        if size > self.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        item.encode(dst)
    }
}
