/// Errors that can occur during frame encoding/decoding and stream I/O.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared frame length exceeds the configured maximum.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A TLV parameter does not fit its 16-bit length field.
    #[error("parameter {param_type} too large to encode ({size} bytes)")]
    ParameterTooLarge { param_type: u16, size: usize },

    /// The frame body failed validation.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream closed cleanly on a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,

    /// The stream closed part-way through a frame.
    #[error("connection lost mid-frame ({buffered} bytes buffered)")]
    ConnectionLost { buffered: usize },
}

/// Validation failures for a single frame.
///
/// Byte alignment with the peer cannot be trusted after any of these, so
/// callers treat them as connection-fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Reserved bits, version, or type tags are not acceptable.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The declared length does not match the bytes that make up the frame.
    #[error("length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// A parameter runs past the span of its enclosing element.
    #[error("truncated parameter {param_type}: needs {needed} bytes, {available} available")]
    TruncatedParameter {
        param_type: u16,
        needed: usize,
        available: usize,
    },
}

pub type Result<T> = std::result::Result<T, FrameError>;
