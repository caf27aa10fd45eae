//! Caller-readable views of reader responses and notifications.
//!
//! Each view is projected from a decoded [`Message`] and serializes with
//! serde, so callbacks receive structured data rather than raw frames.

use llrpc_frame::param::{tlv, tv};
use llrpc_frame::{Message, MessageType, Parameter};
use serde::Serialize;

use crate::error::{ClientError, Result};
use crate::fields::{hex, FieldReader};
use crate::status::LlrpStatus;

/// Connection attempt status: the reader accepted this client.
pub const CONNECTION_SUCCESS: u16 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneralDeviceCapabilities {
    pub max_antennas: u16,
    pub can_set_antenna_properties: bool,
    pub has_utc_clock: bool,
    pub manufacturer: u32,
    pub model: u32,
    pub firmware_version: String,
    pub gpi_count: Option<u16>,
    pub gpo_count: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LlrpCapabilities {
    pub can_do_rf_survey: bool,
    pub can_report_buffer_fill_warning: bool,
    pub supports_client_request_op_spec: bool,
    pub can_do_tag_inventory_state_aware_singulation: bool,
    pub supports_event_and_report_holding: bool,
    pub max_priority_levels: u8,
    pub client_request_op_spec_timeout: u16,
    pub max_rospecs: u32,
    pub max_specs_per_rospec: u32,
    pub max_inventory_parameter_specs_per_aispec: u32,
    pub max_access_specs: u32,
    pub max_opspecs_per_access_spec: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegulatoryCapabilities {
    pub country_code: u16,
    pub communications_standard: u16,
}

/// GET_READER_CAPABILITIES_RESPONSE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReaderCapabilities {
    pub status: LlrpStatus,
    pub general: Option<GeneralDeviceCapabilities>,
    pub llrp: Option<LlrpCapabilities>,
    pub regulatory: Option<RegulatoryCapabilities>,
    /// Types of every top-level parameter, known or not.
    pub parameter_types: Vec<u16>,
}

impl ReaderCapabilities {
    pub fn from_message(message: &Message) -> Result<Self> {
        expect_type(message, MessageType::GetReaderCapabilitiesResponse)?;
        Ok(Self {
            status: LlrpStatus::from_message(message)?,
            general: message
                .find(tlv::GENERAL_DEVICE_CAPABILITIES)
                .and_then(general_capabilities),
            llrp: message
                .find(tlv::LLRP_CAPABILITIES)
                .and_then(llrp_capabilities),
            regulatory: message
                .find(tlv::REGULATORY_CAPABILITIES)
                .and_then(|param| {
                    let mut f = FieldReader::new(param.fields());
                    Some(RegulatoryCapabilities {
                        country_code: f.u16()?,
                        communications_standard: f.u16()?,
                    })
                }),
            parameter_types: parameter_types(message),
        })
    }
}

fn general_capabilities(param: &Parameter) -> Option<GeneralDeviceCapabilities> {
    let mut f = FieldReader::new(param.fields());
    let max_antennas = f.u16()?;
    let flags = f.u16()?;
    let manufacturer = f.u32()?;
    let model = f.u32()?;
    let firmware_version = f.utf8v()?;

    let gpio = param.find(tlv::GPIO_CAPABILITIES).and_then(|gpio| {
        let mut g = FieldReader::new(gpio.fields());
        Some((g.u16()?, g.u16()?))
    });

    Some(GeneralDeviceCapabilities {
        max_antennas,
        can_set_antenna_properties: flags & 0x8000 != 0,
        has_utc_clock: flags & 0x4000 != 0,
        manufacturer,
        model,
        firmware_version,
        gpi_count: gpio.map(|(gpis, _)| gpis),
        gpo_count: gpio.map(|(_, gpos)| gpos),
    })
}

fn llrp_capabilities(param: &Parameter) -> Option<LlrpCapabilities> {
    let mut f = FieldReader::new(param.fields());
    let flags = f.u8()?;
    Some(LlrpCapabilities {
        can_do_rf_survey: flags & 0x80 != 0,
        can_report_buffer_fill_warning: flags & 0x40 != 0,
        supports_client_request_op_spec: flags & 0x20 != 0,
        can_do_tag_inventory_state_aware_singulation: flags & 0x10 != 0,
        supports_event_and_report_holding: flags & 0x08 != 0,
        max_priority_levels: f.u8()?,
        client_request_op_spec_timeout: f.u16()?,
        max_rospecs: f.u32()?,
        max_specs_per_rospec: f.u32()?,
        max_inventory_parameter_specs_per_aispec: f.u32()?,
        max_access_specs: f.u32()?,
        max_opspecs_per_access_spec: f.u32()?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identification {
    pub id_type: u8,
    /// Reader ID (MAC or EPC) as hex.
    pub reader_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AntennaProperties {
    pub connected: bool,
    pub antenna_id: u16,
    pub gain: i16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeepaliveSpec {
    pub trigger_type: u8,
    pub interval_ms: u32,
}

/// GET_READER_CONFIG_RESPONSE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReaderConfig {
    pub status: LlrpStatus,
    pub identification: Option<Identification>,
    pub antenna_properties: Vec<AntennaProperties>,
    pub antenna_configurations: Vec<u16>,
    pub keepalive: Option<KeepaliveSpec>,
    pub hold_events_and_reports: Option<bool>,
    pub ro_report_spec_present: bool,
    pub parameter_types: Vec<u16>,
}

impl ReaderConfig {
    pub fn from_message(message: &Message) -> Result<Self> {
        expect_type(message, MessageType::GetReaderConfigResponse)?;
        Ok(Self {
            status: LlrpStatus::from_message(message)?,
            identification: message.find(tlv::IDENTIFICATION).and_then(|param| {
                let mut f = FieldReader::new(param.fields());
                Some(Identification {
                    id_type: f.u8()?,
                    reader_id: hex(f.u8v()?),
                })
            }),
            antenna_properties: message
                .find_all(tlv::ANTENNA_PROPERTIES)
                .filter_map(|param| {
                    let mut f = FieldReader::new(param.fields());
                    Some(AntennaProperties {
                        connected: f.u8()? & 0x80 != 0,
                        antenna_id: f.u16()?,
                        gain: f.i16()?,
                    })
                })
                .collect(),
            antenna_configurations: message
                .find_all(tlv::ANTENNA_CONFIGURATION)
                .filter_map(|param| FieldReader::new(param.fields()).u16())
                .collect(),
            keepalive: message.find(tlv::KEEPALIVE_SPEC).and_then(|param| {
                let mut f = FieldReader::new(param.fields());
                Some(KeepaliveSpec {
                    trigger_type: f.u8()?,
                    interval_ms: f.u32()?,
                })
            }),
            hold_events_and_reports: message
                .find(tlv::EVENTS_AND_REPORTS)
                .and_then(|param| FieldReader::new(param.fields()).u8())
                .map(|flags| flags & 0x80 != 0),
            ro_report_spec_present: message.find(tlv::RO_REPORT_SPEC).is_some(),
            parameter_types: parameter_types(message),
        })
    }
}

/// One TagReportData entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagReport {
    /// EPC as lowercase hex.
    pub epc: String,
    pub rospec_id: Option<u32>,
    pub spec_index: Option<u16>,
    pub inventory_parameter_spec_id: Option<u16>,
    pub antenna_id: Option<u16>,
    pub peak_rssi: Option<i8>,
    pub channel_index: Option<u16>,
    pub first_seen_utc: Option<u64>,
    pub first_seen_uptime: Option<u64>,
    pub last_seen_utc: Option<u64>,
    pub last_seen_uptime: Option<u64>,
    pub tag_seen_count: Option<u16>,
    pub access_spec_id: Option<u32>,
    pub pc_bits: Option<u16>,
    pub crc: Option<u16>,
}

impl TagReport {
    fn from_parameter(param: &Parameter) -> Self {
        let mut report = TagReport::default();
        for child in param.children() {
            match child {
                Parameter::Tv { param_type, value } => {
                    let mut f = FieldReader::new(value);
                    match *param_type {
                        tv::EPC_96 => report.epc = hex(value),
                        tv::RO_SPEC_ID => report.rospec_id = f.u32(),
                        tv::SPEC_INDEX => report.spec_index = f.u16(),
                        tv::INVENTORY_PARAMETER_SPEC_ID => {
                            report.inventory_parameter_spec_id = f.u16()
                        }
                        tv::ANTENNA_ID => report.antenna_id = f.u16(),
                        tv::PEAK_RSSI => report.peak_rssi = f.u8().map(|b| b as i8),
                        tv::CHANNEL_INDEX => report.channel_index = f.u16(),
                        tv::FIRST_SEEN_TIMESTAMP_UTC => report.first_seen_utc = f.u64(),
                        tv::FIRST_SEEN_TIMESTAMP_UPTIME => report.first_seen_uptime = f.u64(),
                        tv::LAST_SEEN_TIMESTAMP_UTC => report.last_seen_utc = f.u64(),
                        tv::LAST_SEEN_TIMESTAMP_UPTIME => report.last_seen_uptime = f.u64(),
                        tv::TAG_SEEN_COUNT => report.tag_seen_count = f.u16(),
                        tv::ACCESS_SPEC_ID => report.access_spec_id = f.u32(),
                        tv::C1G2_PC => report.pc_bits = f.u16(),
                        tv::C1G2_CRC => report.crc = f.u16(),
                        _ => {}
                    }
                }
                Parameter::Tlv {
                    param_type: tlv::EPC_DATA,
                    fields,
                    ..
                } => {
                    let mut f = FieldReader::new(fields);
                    if let Some(bits) = f.u16() {
                        let len = (bits as usize).div_ceil(8);
                        if let Some(epc) = f.take(len) {
                            report.epc = hex(epc);
                        }
                    }
                }
                _ => {}
            }
        }
        report
    }
}

/// RO_ACCESS_REPORT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoAccessReport {
    pub message_id: u32,
    pub tags: Vec<TagReport>,
}

impl RoAccessReport {
    pub fn from_message(message: &Message) -> Result<Self> {
        expect_type(message, MessageType::RoAccessReport)?;
        Ok(Self {
            message_id: message.message_id,
            tags: message
                .find_all(tlv::TAG_REPORT_DATA)
                .map(TagReport::from_parameter)
                .collect(),
        })
    }
}

/// Reader clock reading attached to an event notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "clock", rename_all = "snake_case")]
pub enum Timestamp {
    Utc { micros: u64 },
    Uptime { micros: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReaderEventKind {
    ConnectionAttempt {
        status: u16,
    },
    ConnectionClose,
    RoSpec {
        event_type: u8,
        rospec_id: u32,
        preempting_rospec_id: u32,
    },
    Antenna {
        event_type: u8,
        antenna_id: u16,
    },
    ReaderException {
        message: String,
    },
    ReportBufferLevelWarning {
        fill_percent: u8,
    },
    ReportBufferOverflow,
    Other {
        parameter_type: u16,
    },
}

/// READER_EVENT_NOTIFICATION.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReaderEvent {
    pub timestamp: Option<Timestamp>,
    pub events: Vec<ReaderEventKind>,
}

impl ReaderEvent {
    pub fn from_message(message: &Message) -> Result<Self> {
        expect_type(message, MessageType::ReaderEventNotification)?;
        let data = message
            .find(tlv::READER_EVENT_NOTIFICATION_DATA)
            .ok_or_else(|| {
                ClientError::ProtocolViolation(
                    "READER_EVENT_NOTIFICATION without ReaderEventNotificationData".to_string(),
                )
            })?;

        let mut timestamp = None;
        let mut events = Vec::new();
        for child in data.children() {
            let mut f = FieldReader::new(child.fields());
            match child.param_type() {
                tlv::UTC_TIMESTAMP => timestamp = f.u64().map(|micros| Timestamp::Utc { micros }),
                tlv::UPTIME => timestamp = f.u64().map(|micros| Timestamp::Uptime { micros }),
                tlv::CONNECTION_ATTEMPT_EVENT => {
                    if let Some(status) = f.u16() {
                        events.push(ReaderEventKind::ConnectionAttempt { status });
                    }
                }
                tlv::CONNECTION_CLOSE_EVENT => events.push(ReaderEventKind::ConnectionClose),
                tlv::RO_SPEC_EVENT => {
                    if let (Some(event_type), Some(rospec_id), Some(preempting_rospec_id)) =
                        (f.u8(), f.u32(), f.u32())
                    {
                        events.push(ReaderEventKind::RoSpec {
                            event_type,
                            rospec_id,
                            preempting_rospec_id,
                        });
                    }
                }
                tlv::ANTENNA_EVENT => {
                    if let (Some(event_type), Some(antenna_id)) = (f.u8(), f.u16()) {
                        events.push(ReaderEventKind::Antenna {
                            event_type,
                            antenna_id,
                        });
                    }
                }
                tlv::READER_EXCEPTION_EVENT => events.push(ReaderEventKind::ReaderException {
                    message: f.utf8v().unwrap_or_default(),
                }),
                tlv::REPORT_BUFFER_LEVEL_WARNING_EVENT => {
                    if let Some(fill_percent) = f.u8() {
                        events.push(ReaderEventKind::ReportBufferLevelWarning { fill_percent });
                    }
                }
                tlv::REPORT_BUFFER_OVERFLOW_ERROR_EVENT => {
                    events.push(ReaderEventKind::ReportBufferOverflow)
                }
                parameter_type => events.push(ReaderEventKind::Other { parameter_type }),
            }
        }

        Ok(Self { timestamp, events })
    }

    /// Status of the ConnectionAttemptEvent, if this notification carries one.
    pub fn connection_attempt_status(&self) -> Option<u16> {
        self.events.iter().find_map(|event| match event {
            ReaderEventKind::ConnectionAttempt { status } => Some(*status),
            _ => None,
        })
    }
}

/// Human-readable name for a ConnectionAttemptEvent status.
pub fn connection_attempt_name(status: u16) -> &'static str {
    match status {
        0 => "Success",
        1 => "Failed_A_Reader_Initiated_Connection_Already_Exists",
        2 => "Failed_A_Client_Initiated_Connection_Already_Exists",
        3 => "Failed_Reason_Other_Than_A_Connection_Already_Exists",
        4 => "Another_Connection_Attempted",
        _ => "Unknown",
    }
}

fn expect_type(message: &Message, expected: MessageType) -> Result<()> {
    if message.message_type == expected {
        return Ok(());
    }
    Err(ClientError::ProtocolViolation(format!(
        "expected {expected}, got {}",
        message.message_type
    )))
}

fn parameter_types(message: &Message) -> Vec<u16> {
    message.parameters.iter().map(Parameter::param_type).collect()
}
