//! LLRP reader client.
//!
//! llrpc talks the Low Level Reader Protocol to fixed RFID readers over TCP:
//! framing and parameter encoding, request/response correlation, ROSpec
//! lifecycle tracking, and callback delivery of tag reports and reader events.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connect with timeout and keepalive, stream abstraction
//! - [`frame`]: LLRP header framing and the parameter tree codec
//! - [`client`]: the reader session and the blocking [`Client`](client::Client) facade

/// Re-export transport types.
pub mod transport {
    pub use llrpc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use llrpc_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use llrpc_client::*;
}

pub use llrpc_client::{Client, ClientConfig, ClientError};
