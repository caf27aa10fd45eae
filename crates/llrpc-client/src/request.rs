//! Reader configuration requests built from [`ReaderSettings`].

use bytes::{BufMut, Bytes, BytesMut};
use llrpc_frame::param::tlv;
use llrpc_frame::{Message, Parameter};

use crate::config::ReaderSettings;
use crate::rospec::report_spec_parameter;

/// GET_READER_CAPABILITIES RequestedData: all capabilities.
pub const ALL_CAPABILITIES: u8 = 0;
/// GET_READER_CONFIG RequestedData: all configuration.
pub const ALL_CONFIGURATION: u8 = 0;

const KEEPALIVE_NULL: u8 = 0;
const KEEPALIVE_PERIODIC: u8 = 1;

/// SET_READER_CONFIG carrying `settings`.
pub fn set_reader_config_message(settings: &ReaderSettings) -> Message {
    Message::set_reader_config(
        settings.reset_to_factory_default,
        reader_config_parameters(settings),
    )
}

/// The parameters of a SET_READER_CONFIG for `settings`.
pub fn reader_config_parameters(settings: &ReaderSettings) -> Vec<Parameter> {
    let mut params = Vec::with_capacity(4);

    if !settings.enabled_events.is_empty() {
        let states = settings
            .enabled_events
            .iter()
            .map(|event_type| {
                let mut fields = BytesMut::with_capacity(3);
                fields.put_u16(*event_type);
                fields.put_u8(0x80);
                Parameter::leaf(tlv::EVENT_NOTIFICATION_STATE, fields.freeze())
            })
            .collect();
        params.push(Parameter::tlv(
            tlv::READER_EVENT_NOTIFICATION_SPEC,
            Bytes::new(),
            states,
        ));
    }

    if let Some(report) = &settings.report {
        params.push(report_spec_parameter(report));
    }

    params.push(keepalive_spec(settings.keepalive_interval_ms));

    let hold = if settings.hold_events_and_reports_upon_reconnect {
        0x80u8
    } else {
        0
    };
    params.push(Parameter::leaf(tlv::EVENTS_AND_REPORTS, vec![hold]));

    params
}

fn keepalive_spec(interval_ms: u32) -> Parameter {
    let trigger = if interval_ms == 0 {
        KEEPALIVE_NULL
    } else {
        KEEPALIVE_PERIODIC
    };
    let mut fields = BytesMut::with_capacity(5);
    fields.put_u8(trigger);
    fields.put_u32(interval_ms);
    Parameter::leaf(tlv::KEEPALIVE_SPEC, fields.freeze())
}
