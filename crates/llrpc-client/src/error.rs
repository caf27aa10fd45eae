use std::time::Duration;

use llrpc_frame::{DecodeError, FrameError};
use llrpc_transport::TransportError;

/// Failures while establishing a reader connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The reader address was unreachable.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The reader answered the connection attempt with a non-success status.
    #[error("reader refused connection (status {status_code}): {description}")]
    Refused { status_code: u16, description: String },

    /// The reader sent something other than the expected connection event.
    #[error("connection handshake failed: {0}")]
    Handshake(String),

    /// No connection event arrived in time.
    #[error("no connection event within {0:?}")]
    Timeout(Duration),
}

/// Errors returned by client operations.
///
/// Every fallible operation returns one of these directly; the client keeps
/// no process-wide error slot.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connect failed: {0}")]
    Connect(#[from] ConnectError),

    /// A frame failed validation. Always connection-fatal.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("frame error: {0}")]
    Frame(FrameError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No response within the deadline. The reader-side operation may still run.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The connection closed or failed; no further requests can succeed.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The reader answered with a non-success LLRPStatus.
    #[error("reader rejected request (status {status_code}): {description}")]
    ReaderRejected { status_code: u16, description: String },

    #[error("ROSpec {0} already exists")]
    DuplicateId(u32),

    #[error("ROSpec {0} is not known to this session")]
    UnknownId(u32),

    #[error("ROSpec {0} is not enabled")]
    NotEnabled(u32),

    /// ROSpec ID 0 is reserved for "all ROSpecs".
    #[error("ROSpec ID 0 is reserved")]
    InvalidRoSpecId,

    /// The reader sent a well-formed message that makes no sense here.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("not connected")]
    NotConnected,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Decode(decode) => ClientError::Decode(decode),
            FrameError::ConnectionClosed => {
                ClientError::ConnectionLost("connection closed by reader".to_string())
            }
            FrameError::ConnectionLost { buffered } => ClientError::ConnectionLost(format!(
                "connection closed mid-frame ({buffered} bytes buffered)"
            )),
            other => ClientError::Frame(other),
        }
    }
}

impl ClientError {
    /// True if the connection cannot be used after this error.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Decode(_)
                | ClientError::Frame(_)
                | ClientError::Transport(_)
                | ClientError::ConnectionLost(_)
                | ClientError::NotConnected
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
