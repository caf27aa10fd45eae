use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::LlrpStream;

/// IANA-assigned LLRP port.
pub const DEFAULT_LLRP_PORT: u16 = 5084;

/// TCP transport to an LLRP reader.
///
/// Resolves the reader address and tries each resolved socket address in
/// turn, bounding every attempt by the connect timeout.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    keepalive: bool,
}

impl TcpTransport {
    /// Create a transport for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(5),
            keepalive: true,
        }
    }

    /// Override the per-address connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable TCP keepalive on the connected stream.
    pub fn with_keepalive(mut self, enabled: bool) -> Self {
        self.keepalive = enabled;
        self
    }

    /// `host:port` as a display string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connect to the reader (blocking, bounded by the connect timeout).
    pub fn connect(&self) -> Result<LlrpStream> {
        let addr = self.addr();
        let candidates = self.resolve()?;

        let mut last_err = None;
        for candidate in candidates {
            debug!(%candidate, timeout = ?self.connect_timeout, "connecting to reader");
            match TcpStream::connect_timeout(&candidate, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    let stream = LlrpStream::from_tcp(stream);
                    stream.set_keepalive(self.keepalive)?;
                    info!(%candidate, "connected to reader");
                    return Ok(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(TransportError::Connect {
            addr,
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "address resolved to no candidates",
                )
            }),
        })
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map(Iterator::collect)
            .map_err(|source| TransportError::Resolve {
                addr: self.addr(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    #[test]
    fn connect_to_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            buf
        });

        let mut stream = TcpTransport::new("127.0.0.1", port)
            .with_connect_timeout(Duration::from_secs(1))
            .connect()
            .unwrap();
        stream.write_all(b"hello").unwrap();

        assert_eq!(&server.join().unwrap(), b"hello");
    }

    #[test]
    fn connect_refused_reports_address() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = TcpTransport::new("127.0.0.1", port)
            .with_connect_timeout(Duration::from_millis(200))
            .connect()
            .unwrap_err();

        match err {
            TransportError::Connect { addr, .. } => assert_eq!(addr, format!("127.0.0.1:{port}")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unresolvable_host_is_resolve_error() {
        let err = TcpTransport::new("no such host.invalid", DEFAULT_LLRP_PORT)
            .connect()
            .unwrap_err();
        assert!(matches!(err, TransportError::Resolve { .. }));
    }

    #[test]
    fn addr_formats_host_and_port() {
        let transport = TcpTransport::new("reader.local", DEFAULT_LLRP_PORT).with_keepalive(false);
        assert_eq!(transport.addr(), "reader.local:5084");
    }
}
