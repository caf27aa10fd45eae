use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};

use crate::error::Result;

/// A connected duplex stream to a reader — implements Read + Write.
///
/// This is the fundamental I/O type consumed by the framing layer.
/// Over the network it wraps a TCP stream; locally (reader proxies,
/// simulators, tests) it can wrap a Unix stream socket.
pub struct LlrpStream {
    inner: LlrpStreamInner,
}

enum LlrpStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for LlrpStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LlrpStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            LlrpStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for LlrpStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LlrpStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            LlrpStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            LlrpStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            LlrpStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl From<TcpStream> for LlrpStream {
    fn from(stream: TcpStream) -> Self {
        Self::from_tcp(stream)
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for LlrpStream {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        Self::from_unix(stream)
    }
}

impl LlrpStream {
    /// Wrap a connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: LlrpStreamInner::Tcp(stream),
        }
    }

    /// Wrap a connected Unix stream socket.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: LlrpStreamInner::Unix(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            LlrpStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            LlrpStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            LlrpStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            LlrpStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// Used to split one connection into an inbound read half and a write half.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            LlrpStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
            #[cfg(unix)]
            LlrpStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Shut down both directions of the stream.
    ///
    /// Unblocks any thread parked in `read` on a clone of this stream.
    /// Shutting down an already-disconnected stream is not an error.
    pub fn shutdown(&self) -> Result<()> {
        let res = match &self.inner {
            LlrpStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            LlrpStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
        };
        match res {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Enable or disable `SO_KEEPALIVE` so a silently dead reader is detected.
    ///
    /// No-op for Unix stream sockets.
    pub fn set_keepalive(&self, enabled: bool) -> Result<()> {
        match &self.inner {
            LlrpStreamInner::Tcp(stream) => set_tcp_keepalive(stream, enabled),
            #[cfg(unix)]
            LlrpStreamInner::Unix(_) => Ok(()),
        }
    }

    /// Human-readable description of the remote end.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            LlrpStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:<unknown>".to_string()),
            #[cfg(unix)]
            LlrpStreamInner::Unix(_) => "unix:<local>".to_string(),
        }
    }
}

#[cfg(unix)]
fn set_tcp_keepalive(stream: &TcpStream, enabled: bool) -> Result<()> {
    use std::os::fd::AsRawFd;

    let fd = stream.as_raw_fd();
    let value: libc::c_int = libc::c_int::from(enabled);

    // SAFETY: `value` is a valid readable c_int for the duration of the call
    // and `fd` is an open socket descriptor owned by `stream`.
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_KEEPALIVE,
            (&value as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };

    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error().into())
    }
}

#[cfg(not(unix))]
fn set_tcp_keepalive(_stream: &TcpStream, _enabled: bool) -> Result<()> {
    tracing::debug!("tcp keepalive not configurable on this platform");
    Ok(())
}

impl std::fmt::Debug for LlrpStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            LlrpStreamInner::Tcp(_) => f.debug_struct("LlrpStream").field("type", &"tcp").finish(),
            #[cfg(unix)]
            LlrpStreamInner::Unix(_) => {
                f.debug_struct("LlrpStream").field("type", &"unix").finish()
            }
        }
    }
}
