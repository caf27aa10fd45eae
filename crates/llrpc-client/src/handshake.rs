//! Connection-attempt handshake.
//!
//! After the TCP connect, a reader announces whether it accepts the client
//! with a READER_EVENT_NOTIFICATION carrying a ConnectionAttemptEvent.
//! Nothing else may be sent until a successful one arrives.

use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use llrpc_frame::{FrameError, FrameReader, MessageType};
use tracing::{debug, trace};

use crate::error::ConnectError;
use crate::report::{connection_attempt_name, ReaderEvent, CONNECTION_SUCCESS};

/// What the reader said when it accepted the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResult {
    /// Protocol version from the connection event header.
    pub protocol_version: u8,
    /// The accepting notification, for delivery to reader-event handlers.
    pub event: ReaderEvent,
}

/// Block until the reader accepts or refuses the connection.
///
/// KEEPALIVEs and reader events without a ConnectionAttemptEvent are
/// skipped. Any other message is a handshake failure.
pub fn await_connection_event<R: Read>(
    reader: &mut FrameReader<R>,
    timeout: Duration,
) -> Result<HandshakeResult, ConnectError> {
    let deadline = Instant::now() + timeout;
    loop {
        if Instant::now() >= deadline {
            return Err(ConnectError::Timeout(timeout));
        }

        let message = match reader.read_message() {
            Ok(message) => message,
            Err(FrameError::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(FrameError::ConnectionClosed) | Err(FrameError::ConnectionLost { .. }) => {
                return Err(ConnectError::Handshake(
                    "connection closed during handshake".to_string(),
                ));
            }
            Err(err) => return Err(ConnectError::Handshake(err.to_string())),
        };

        match message.message_type {
            MessageType::ReaderEventNotification => {
                let event = ReaderEvent::from_message(&message)
                    .map_err(|err| ConnectError::Handshake(err.to_string()))?;
                let Some(status) = event.connection_attempt_status() else {
                    trace!("reader event before connection event, skipping");
                    continue;
                };
                if status != CONNECTION_SUCCESS {
                    return Err(ConnectError::Refused {
                        status_code: status,
                        description: connection_attempt_name(status).to_string(),
                    });
                }
                debug!(version = message.version, "reader accepted connection");
                return Ok(HandshakeResult {
                    protocol_version: message.version,
                    event,
                });
            }
            MessageType::KeepAlive => {
                trace!("keepalive before connection event, skipping");
            }
            other => {
                return Err(ConnectError::Handshake(format!(
                    "expected connection event, got {other}"
                )));
            }
        }
    }
}
