//! LLRP client engine.
//!
//! [`Client`] owns one reader connection. Requests block the caller until
//! the reader answers; an inbound loop thread matches responses to requests
//! by message ID and routes everything else (access reports, reader events,
//! keepalives) to per-category notification handlers.
//!
//! ```no_run
//! use std::time::Duration;
//! use llrpc_client::{Client, ClientConfig};
//!
//! # fn main() -> llrpc_client::Result<()> {
//! let client = Client::connect(ClientConfig::new("192.168.1.50"))?;
//! client.on_access_report(|report| {
//!     for tag in &report.tags {
//!         println!("{} antenna {:?}", tag.epc, tag.antenna_id);
//!     }
//! });
//!
//! let id = client.add_configured_rospec()?;
//! client.enable_rospec(id)?;
//! client.start_rospec(id)?;
//! std::thread::sleep(Duration::from_secs(5));
//! client.stop_rospec(id)?;
//! client.close()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod correlator;
pub mod dispatcher;
pub mod error;
mod fields;
pub mod handshake;
pub mod report;
pub mod request;
pub mod rospec;
pub mod session;
pub mod status;

#[cfg(test)]
mod mock;

pub use client::Client;
pub use config::{
    AiSpecStopTrigger, ClientConfig, ReaderSettings, ReportSpec, ReportTrigger, RoSpecConfig,
    StartTrigger, StopTrigger, TagContent,
};
pub use dispatcher::{Category, CategoryStats, Notification};
pub use error::{ClientError, ConnectError, Result};
pub use report::{
    ReaderCapabilities, ReaderConfig, ReaderEvent, ReaderEventKind, RoAccessReport, TagReport,
    Timestamp,
};
pub use rospec::{RoSpecEntry, RoSpecState, RoSpecSummary, ALL_ROSPECS};
pub use session::{ConnectionState, Diagnostics};
pub use status::LlrpStatus;
