use std::fmt;
use std::io;

use llrpc_client::{ClientError, ConnectError};
use llrpc_frame::FrameError;
use llrpc_transport::TransportError;

// Sysexits-style exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::FrameTooLarge { .. }
        | FrameError::ParameterTooLarge { .. }
        | FrameError::Decode(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        FrameError::ConnectionClosed | FrameError::ConnectionLost { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Connect(ConnectError::Transport(err)) | ClientError::Transport(err) => {
            transport_error(context, err)
        }
        ClientError::Connect(ConnectError::Timeout(_)) | ClientError::Timeout(_) => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        ClientError::Frame(err) => frame_error(context, err),
        ClientError::Decode(_)
        | ClientError::ProtocolViolation(_)
        | ClientError::Config(_)
        | ClientError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        ClientError::DuplicateId(_)
        | ClientError::UnknownId(_)
        | ClientError::NotEnabled(_)
        | ClientError::InvalidRoSpecId => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn connect_timeouts_map_to_124() {
        let err = ClientError::Connect(ConnectError::Timeout(Duration::from_secs(1)));
        assert_eq!(client_error("connect", err).code, TIMEOUT);

        let err = ClientError::Connect(ConnectError::Transport(TransportError::Connect {
            addr: "reader:5084".to_string(),
            source: io::Error::new(io::ErrorKind::TimedOut, "timed out"),
        }));
        assert_eq!(client_error("connect", err).code, TIMEOUT);
    }

    #[test]
    fn refused_connections_are_plain_failures() {
        let err = ClientError::Connect(ConnectError::Transport(TransportError::Connect {
            addr: "reader:5084".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        }));
        let cli = client_error("connect", err);
        assert_eq!(cli.code, FAILURE);
        assert!(cli.message.starts_with("connect: "));

        let err = ClientError::Connect(ConnectError::Refused {
            status_code: 1,
            description: "another client connected".to_string(),
        });
        assert_eq!(client_error("connect", err).code, FAILURE);
    }

    #[test]
    fn bad_config_and_frames_are_data_errors() {
        let err = ClientError::Config("host is required".to_string());
        assert_eq!(client_error("config", err).code, DATA_INVALID);

        let err = ClientError::Frame(FrameError::FrameTooLarge { size: 10, max: 1 });
        assert_eq!(client_error("read", err).code, DATA_INVALID);
    }

    #[test]
    fn rospec_state_errors_are_usage_errors() {
        assert_eq!(client_error("start", ClientError::NotEnabled(3)).code, USAGE);
        assert_eq!(client_error("add", ClientError::InvalidRoSpecId).code, USAGE);
    }
}
