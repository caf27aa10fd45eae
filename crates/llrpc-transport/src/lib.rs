//! Duplex byte-stream transport for LLRP clients.
//!
//! LLRP runs over an ordered, reliable byte stream, conventionally TCP to
//! port 5084. This crate provides:
//! - [`LlrpStream`], a connected stream over TCP or a Unix stream socket
//! - [`TcpTransport`], resolving and connecting to a reader with a timeout
//!
//! This is the lowest layer of llrpc. Everything else builds on top of
//! the [`LlrpStream`] type provided here.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::{TcpTransport, DEFAULT_LLRP_PORT};
pub use traits::LlrpStream;
