use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use llrpc_transport::LlrpStream;
use tracing::trace;

use crate::codec::{decode_frame, FrameConfig, RawFrame};
use crate::error::{FrameError, Result};
use crate::message::Message;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete LLRP frames from any `Read` stream.
///
/// Handles partial reads internally — callers always get complete frames.
/// Each frame is cut at its declared length before the body is validated,
/// so a body that fails to decode never shifts the offsets of the next one.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached on a
    /// frame boundary and `Err(FrameError::ConnectionLost)` when EOF cuts a
    /// frame short.
    pub fn read_frame(&mut self) -> Result<RawFrame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_frame_size)? {
                trace!(
                    message_type = frame.header.message_type,
                    message_id = frame.header.message_id,
                    len = frame.wire_size(),
                    "frame received"
                );
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if self.buf.is_empty() {
                    return Err(FrameError::ConnectionClosed);
                }
                return Err(FrameError::ConnectionLost {
                    buffered: self.buf.len(),
                });
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read and decode the next message (blocking).
    ///
    /// A body that fails validation is returned as `FrameError::Decode`
    /// after the whole frame has been consumed.
    pub fn read_message(&mut self) -> Result<Message> {
        let frame = self.read_frame()?;
        Ok(Message::from_frame(frame)?)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<LlrpStream> {
    /// Create a frame reader for `LlrpStream` and apply read timeout from config.
    pub fn with_config_llrp(inner: LlrpStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: llrpc_transport::TransportError) -> FrameError {
    match err {
        llrpc_transport::TransportError::Io(io) => FrameError::Io(io),
        llrpc_transport::TransportError::Resolve { source, .. }
        | llrpc_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
    }
}
