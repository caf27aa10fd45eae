//! Startup configuration for a reader connection.
//!
//! Loaded once from a JSON document and never mutated by the client.
//! Every field has a default except `host`.

use std::path::Path;
use std::time::Duration;

use llrpc_frame::DEFAULT_MAX_FRAME;
use llrpc_transport::DEFAULT_LLRP_PORT;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Connection and reader defaults for one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    // -------------------------------------------------------------------------
    // Network
    // -------------------------------------------------------------------------
    /// Reader host name or address.
    pub host: String,
    pub port: u16,
    /// TCP connect and connection-event wait (milliseconds)
    pub connect_timeout_ms: u64,
    /// Per-request response deadline (milliseconds)
    pub response_timeout_ms: u64,
    /// How long `close()` waits for CLOSE_CONNECTION_RESPONSE (milliseconds)
    pub close_grace_ms: u64,
    pub tcp_keepalive: bool,

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------
    /// Largest accepted frame, header included.
    pub max_frame_size: usize,
    /// Per-category notification queue bound.
    pub notification_queue_capacity: usize,
    /// Wait for the reader's ConnectionAttemptEvent before returning from connect.
    pub await_connection_event: bool,
    /// Answer reader KEEPALIVEs with KEEPALIVE_ACK from the inbound loop.
    pub auto_ack_keepalive: bool,

    // -------------------------------------------------------------------------
    // Reader defaults
    // -------------------------------------------------------------------------
    pub reader_config: ReaderSettings,
    pub rospec: RoSpecConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_LLRP_PORT,
            connect_timeout_ms: 5000,
            response_timeout_ms: 5000,
            close_grace_ms: 2000,
            tcp_keepalive: true,
            max_frame_size: DEFAULT_MAX_FRAME,
            notification_queue_capacity: 1024,
            await_connection_event: true,
            auto_ack_keepalive: false,
            reader_config: ReaderSettings::default(),
            rospec: RoSpecConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults for `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|err| ClientError::Config(format!("{}: {err}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ClientError::Config("host is required".to_string()));
        }
        if self.port == 0 {
            return Err(ClientError::Config("port must be nonzero".to_string()));
        }
        if self.connect_timeout_ms == 0 || self.response_timeout_ms == 0 {
            return Err(ClientError::Config("timeouts must be nonzero".to_string()));
        }
        if self.max_frame_size < llrpc_frame::HEADER_SIZE {
            return Err(ClientError::Config(format!(
                "max_frame_size {} is smaller than the frame header",
                self.max_frame_size
            )));
        }
        if self.notification_queue_capacity == 0 {
            return Err(ClientError::Config(
                "notification_queue_capacity must be nonzero".to_string(),
            ));
        }
        self.rospec.validate()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    /// `host:port` as a display string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// SET_READER_CONFIG contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    pub reset_to_factory_default: bool,
    /// Reader keepalive period; 0 disables reader keepalives.
    pub keepalive_interval_ms: u32,
    pub hold_events_and_reports_upon_reconnect: bool,
    /// Reader-wide default report spec, applied when set.
    pub report: Option<ReportSpec>,
    /// Reader event types to switch on (LLRP EventNotificationState types).
    pub enabled_events: Vec<u16>,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            reset_to_factory_default: false,
            keepalive_interval_ms: 10_000,
            hold_events_and_reports_upon_reconnect: false,
            report: None,
            enabled_events: Vec::new(),
        }
    }
}

/// When the reader emits RO_ACCESS_REPORTs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportTrigger {
    /// Only on GET_REPORT.
    None,
    /// After N tags or at the end of each AISpec.
    EndOfAiSpec,
    /// After N tags or at the end of the ROSpec.
    EndOfRoSpec,
}

impl ReportTrigger {
    pub fn as_u8(self) -> u8 {
        match self {
            ReportTrigger::None => 0,
            ReportTrigger::EndOfAiSpec => 1,
            ReportTrigger::EndOfRoSpec => 2,
        }
    }
}

/// Which fields each TagReportData carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagContent {
    pub rospec_id: bool,
    pub spec_index: bool,
    pub inventory_parameter_spec_id: bool,
    pub antenna_id: bool,
    pub channel_index: bool,
    pub peak_rssi: bool,
    pub first_seen_timestamp: bool,
    pub last_seen_timestamp: bool,
    pub tag_seen_count: bool,
    pub access_spec_id: bool,
    pub crc: bool,
    pub pc_bits: bool,
}

impl Default for TagContent {
    fn default() -> Self {
        Self {
            rospec_id: true,
            spec_index: false,
            inventory_parameter_spec_id: false,
            antenna_id: true,
            channel_index: false,
            peak_rssi: true,
            first_seen_timestamp: true,
            last_seen_timestamp: false,
            tag_seen_count: true,
            access_spec_id: false,
            crc: false,
            pc_bits: false,
        }
    }
}

impl TagContent {
    /// TagReportContentSelector flag word, most significant bit first.
    pub fn selector_bits(&self) -> u16 {
        [
            self.rospec_id,
            self.spec_index,
            self.inventory_parameter_spec_id,
            self.antenna_id,
            self.channel_index,
            self.peak_rssi,
            self.first_seen_timestamp,
            self.last_seen_timestamp,
            self.tag_seen_count,
            self.access_spec_id,
        ]
        .iter()
        .enumerate()
        .filter(|(_, enabled)| **enabled)
        .fold(0u16, |bits, (i, _)| bits | (0x8000 >> i))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSpec {
    pub trigger: ReportTrigger,
    /// Report after this many tags; 0 means only on the trigger boundary.
    pub every_n_tags: u16,
    pub content: TagContent,
}

impl Default for ReportSpec {
    fn default() -> Self {
        Self {
            trigger: ReportTrigger::EndOfAiSpec,
            every_n_tags: 1,
            content: TagContent::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StartTrigger {
    /// Started only by START_ROSPEC.
    Null,
    /// Starts as soon as the ROSpec is enabled.
    Immediate,
    Periodic { offset_ms: u32, period_ms: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopTrigger {
    /// Runs until STOP_ROSPEC.
    Null,
    Duration { duration_ms: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AiSpecStopTrigger {
    Null,
    Duration { duration_ms: u32 },
    /// After `tag_count` tags are seen, or `timeout_ms` elapses.
    TagObservation { tag_count: u16, timeout_ms: u32 },
}

/// The ROSpec added by `Client::add_configured_rospec`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoSpecConfig {
    pub id: u32,
    pub priority: u8,
    /// Antenna IDs; `[0]` means every antenna.
    pub antennas: Vec<u16>,
    pub start_trigger: StartTrigger,
    pub stop_trigger: StopTrigger,
    pub ai_stop_trigger: AiSpecStopTrigger,
    pub inventory_parameter_spec_id: u16,
    pub report: ReportSpec,
}

impl Default for RoSpecConfig {
    fn default() -> Self {
        Self {
            id: 1,
            priority: 0,
            antennas: vec![0],
            start_trigger: StartTrigger::Null,
            stop_trigger: StopTrigger::Null,
            ai_stop_trigger: AiSpecStopTrigger::Null,
            inventory_parameter_spec_id: 1,
            report: ReportSpec::default(),
        }
    }
}

impl RoSpecConfig {
    pub fn validate(&self) -> Result<()> {
        if self.id == 0 {
            return Err(ClientError::Config("rospec.id must be nonzero".to_string()));
        }
        if self.priority > 7 {
            return Err(ClientError::Config(format!(
                "rospec.priority {} out of range 0-7",
                self.priority
            )));
        }
        if self.antennas.is_empty() {
            return Err(ClientError::Config(
                "rospec.antennas must name at least one antenna (0 = all)".to_string(),
            ));
        }
        if self.inventory_parameter_spec_id == 0 {
            return Err(ClientError::Config(
                "rospec.inventory_parameter_spec_id must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}
