//! ROSpec shadow table and lifecycle rules.
//!
//! The reader owns ROSpec state. The client keeps a shadow copy that moves
//! only on confirmed success responses (and on the reader's own ROSpec
//! events), never optimistically on send.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};
use llrpc_frame::param::tlv;
use llrpc_frame::{Message, MessageType, Parameter};
use serde::Serialize;

use crate::config::{AiSpecStopTrigger, ReportSpec, RoSpecConfig, StartTrigger, StopTrigger};
use crate::error::{ClientError, Result};
use crate::fields::FieldReader;

/// Reserved ROSpec ID addressing every ROSpec on the reader.
pub const ALL_ROSPECS: u32 = 0;

/// EPCglobal Class-1 Gen-2 air protocol ID.
const PROTOCOL_EPC_C1G2: u8 = 1;

/// ROSpecEvent types.
const ROSPEC_EVENT_START: u8 = 0;
const ROSPEC_EVENT_END: u8 = 1;
const ROSPEC_EVENT_PREEMPTED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoSpecState {
    Unknown,
    Disabled,
    Inactive,
    Active,
    Deleted,
}

impl RoSpecState {
    fn from_wire(state: u8) -> Self {
        match state {
            0 => RoSpecState::Disabled,
            1 => RoSpecState::Inactive,
            2 => RoSpecState::Active,
            _ => RoSpecState::Unknown,
        }
    }

    /// True for states the reader still holds.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            RoSpecState::Disabled | RoSpecState::Inactive | RoSpecState::Active
        )
    }
}

impl std::fmt::Display for RoSpecState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RoSpecState::Unknown => "unknown",
            RoSpecState::Disabled => "disabled",
            RoSpecState::Inactive => "inactive",
            RoSpecState::Active => "active",
            RoSpecState::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// A shadow state change to apply once the reader confirms success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoSpecOp {
    Add(RoSpecConfig),
    Enable(u32),
    Start(u32),
    Stop(u32),
    Disable(u32),
    Delete(u32),
    /// Replace the table with a GET_ROSPECS listing.
    Reconcile,
}

/// Whether a lifecycle request needs a reader round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precheck {
    Forward,
    /// Already in the target state; succeed without sending.
    AlreadyDone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoSpecEntry {
    pub id: u32,
    pub state: RoSpecState,
    /// The configuration this client added, if it added it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<RoSpecConfig>,
}

/// One ROSpec as listed by GET_ROSPECS_RESPONSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoSpecSummary {
    pub id: u32,
    pub priority: u8,
    pub state: RoSpecState,
}

/// Shadow view of reader-side ROSpecs, keyed by ROSpec ID.
#[derive(Debug, Default)]
pub struct RoSpecTable {
    entries: BTreeMap<u32, RoSpecEntry>,
}

impl RoSpecTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: u32) -> RoSpecState {
        self.entries
            .get(&id)
            .map_or(RoSpecState::Unknown, |entry| entry.state)
    }

    pub fn entries(&self) -> Vec<RoSpecEntry> {
        self.entries.values().cloned().collect()
    }

    pub fn check_add(&self, id: u32) -> Result<Precheck> {
        if id == ALL_ROSPECS {
            return Err(ClientError::InvalidRoSpecId);
        }
        if self.state(id).is_live() {
            return Err(ClientError::DuplicateId(id));
        }
        Ok(Precheck::Forward)
    }

    pub fn check_enable(&self, id: u32) -> Result<Precheck> {
        self.require_live(id)?;
        Ok(Precheck::Forward)
    }

    pub fn check_start(&self, id: u32) -> Result<Precheck> {
        match self.require_live(id)? {
            RoSpecState::Disabled => Err(ClientError::NotEnabled(id)),
            _ => Ok(Precheck::Forward),
        }
    }

    pub fn check_stop(&self, id: u32) -> Result<Precheck> {
        match self.require_live(id)? {
            RoSpecState::Disabled => Err(ClientError::NotEnabled(id)),
            RoSpecState::Inactive => Ok(Precheck::AlreadyDone),
            _ => Ok(Precheck::Forward),
        }
    }

    pub fn check_disable(&self, id: u32) -> Result<Precheck> {
        match self.require_live(id)? {
            RoSpecState::Disabled => Ok(Precheck::AlreadyDone),
            _ => Ok(Precheck::Forward),
        }
    }

    /// DELETE is always forwarded: the reader may hold ROSpecs this session
    /// never saw.
    pub fn check_delete(&self, _id: u32) -> Result<Precheck> {
        Ok(Precheck::Forward)
    }

    fn require_live(&self, id: u32) -> Result<RoSpecState> {
        if id == ALL_ROSPECS {
            return Err(ClientError::InvalidRoSpecId);
        }
        let state = self.state(id);
        if !state.is_live() {
            return Err(ClientError::UnknownId(id));
        }
        Ok(state)
    }

    /// Apply a confirmed operation. `response` is the success response.
    pub fn apply(&mut self, op: &RoSpecOp, response: &Message) {
        match op {
            RoSpecOp::Add(spec) => {
                self.entries.insert(
                    spec.id,
                    RoSpecEntry {
                        id: spec.id,
                        state: RoSpecState::Disabled,
                        spec: Some(spec.clone()),
                    },
                );
            }
            RoSpecOp::Enable(id) => {
                self.transition(*id, |state| match state {
                    RoSpecState::Disabled => RoSpecState::Inactive,
                    other => other,
                });
            }
            RoSpecOp::Start(id) => self.transition(*id, |_| RoSpecState::Active),
            RoSpecOp::Stop(id) => self.transition(*id, |_| RoSpecState::Inactive),
            RoSpecOp::Disable(id) => self.transition(*id, |_| RoSpecState::Disabled),
            RoSpecOp::Delete(ALL_ROSPECS) => {
                for entry in self.entries.values_mut() {
                    entry.state = RoSpecState::Deleted;
                }
            }
            RoSpecOp::Delete(id) => {
                self.entries
                    .entry(*id)
                    .and_modify(|entry| entry.state = RoSpecState::Deleted)
                    .or_insert(RoSpecEntry {
                        id: *id,
                        state: RoSpecState::Deleted,
                        spec: None,
                    });
            }
            RoSpecOp::Reconcile => self.reconcile(&rospec_summaries(response)),
        }
    }

    /// Adopt the reader's listing: listed IDs take the listed state, live
    /// entries the reader no longer lists become Deleted.
    pub fn reconcile(&mut self, listed: &[RoSpecSummary]) {
        for entry in self.entries.values_mut() {
            if entry.state.is_live() && !listed.iter().any(|s| s.id == entry.id) {
                entry.state = RoSpecState::Deleted;
            }
        }
        for summary in listed {
            self.entries
                .entry(summary.id)
                .and_modify(|entry| entry.state = summary.state)
                .or_insert(RoSpecEntry {
                    id: summary.id,
                    state: summary.state,
                    spec: None,
                });
        }
    }

    /// Track reader-driven starts and ends (triggers, preemption).
    pub fn apply_reader_event(&mut self, event_type: u8, rospec_id: u32) {
        match event_type {
            ROSPEC_EVENT_START => self.transition(rospec_id, |_| RoSpecState::Active),
            ROSPEC_EVENT_END | ROSPEC_EVENT_PREEMPTED => {
                self.transition(rospec_id, |state| match state {
                    RoSpecState::Active => RoSpecState::Inactive,
                    other => other,
                })
            }
            _ => {}
        }
    }

    fn transition(&mut self, id: u32, next: impl FnOnce(RoSpecState) -> RoSpecState) {
        if let Some(entry) = self.entries.get_mut(&id) {
            if entry.state.is_live() {
                entry.state = next(entry.state);
            }
        }
    }
}

/// ROSpecs listed in a GET_ROSPECS_RESPONSE.
pub fn rospec_summaries(message: &Message) -> Vec<RoSpecSummary> {
    message
        .find_all(tlv::RO_SPEC)
        .filter_map(|param| {
            let mut f = FieldReader::new(param.fields());
            Some(RoSpecSummary {
                id: f.u32()?,
                priority: f.u8()?,
                state: RoSpecState::from_wire(f.u8()?),
            })
        })
        .collect()
}

/// Build the ADD_ROSPEC request for `spec`.
pub fn add_rospec_message(spec: &RoSpecConfig) -> Message {
    Message::add_rospec(rospec_parameter(spec))
}

/// Build the ROSpec parameter tree for `spec`, in the Disabled state.
pub fn rospec_parameter(spec: &RoSpecConfig) -> Parameter {
    let mut fields = BytesMut::with_capacity(6);
    fields.put_u32(spec.id);
    fields.put_u8(spec.priority);
    fields.put_u8(0);

    Parameter::tlv(
        tlv::RO_SPEC,
        fields.freeze(),
        vec![
            boundary_spec(spec.start_trigger, spec.stop_trigger),
            ai_spec(spec),
            report_spec_parameter(&spec.report),
        ],
    )
}

/// ROReportSpec with its content selector.
pub fn report_spec_parameter(report: &ReportSpec) -> Parameter {
    let mut fields = BytesMut::with_capacity(3);
    fields.put_u8(report.trigger.as_u8());
    fields.put_u16(report.every_n_tags);

    let mut memory = 0u8;
    if report.content.crc {
        memory |= 0x80;
    }
    if report.content.pc_bits {
        memory |= 0x40;
    }

    Parameter::tlv(
        tlv::RO_REPORT_SPEC,
        fields.freeze(),
        vec![Parameter::tlv(
            tlv::TAG_REPORT_CONTENT_SELECTOR,
            report.content.selector_bits().to_be_bytes().to_vec(),
            vec![Parameter::leaf(tlv::C1G2_EPC_MEMORY_SELECTOR, vec![memory])],
        )],
    )
}

fn boundary_spec(start: StartTrigger, stop: StopTrigger) -> Parameter {
    let start = match start {
        StartTrigger::Null => Parameter::leaf(tlv::RO_SPEC_START_TRIGGER, vec![0u8]),
        StartTrigger::Immediate => Parameter::leaf(tlv::RO_SPEC_START_TRIGGER, vec![1u8]),
        StartTrigger::Periodic {
            offset_ms,
            period_ms,
        } => {
            let mut periodic = BytesMut::with_capacity(8);
            periodic.put_u32(offset_ms);
            periodic.put_u32(period_ms);
            Parameter::tlv(
                tlv::RO_SPEC_START_TRIGGER,
                vec![2u8],
                vec![Parameter::leaf(tlv::PERIODIC_TRIGGER_VALUE, periodic.freeze())],
            )
        }
    };

    let (stop_type, duration) = match stop {
        StopTrigger::Null => (0u8, 0u32),
        StopTrigger::Duration { duration_ms } => (1, duration_ms),
    };
    let mut stop_fields = BytesMut::with_capacity(5);
    stop_fields.put_u8(stop_type);
    stop_fields.put_u32(duration);

    Parameter::tlv(
        tlv::RO_BOUNDARY_SPEC,
        Bytes::new(),
        vec![start, Parameter::leaf(tlv::RO_SPEC_STOP_TRIGGER, stop_fields.freeze())],
    )
}

fn ai_spec(spec: &RoSpecConfig) -> Parameter {
    let mut antennas = BytesMut::with_capacity(2 + spec.antennas.len() * 2);
    antennas.put_u16(spec.antennas.len() as u16);
    for antenna in &spec.antennas {
        antennas.put_u16(*antenna);
    }

    let stop = match spec.ai_stop_trigger {
        AiSpecStopTrigger::Null => ai_stop_trigger(0, 0, Vec::new()),
        AiSpecStopTrigger::Duration { duration_ms } => ai_stop_trigger(1, duration_ms, Vec::new()),
        AiSpecStopTrigger::TagObservation {
            tag_count,
            timeout_ms,
        } => {
            let mut observation = BytesMut::with_capacity(12);
            observation.put_u8(0); // upon seeing N tags or timeout
            observation.put_u8(0);
            observation.put_u16(tag_count);
            observation.put_u16(0);
            observation.put_u16(0);
            observation.put_u32(timeout_ms);
            ai_stop_trigger(
                3,
                0,
                vec![Parameter::leaf(tlv::TAG_OBSERVATION_TRIGGER, observation.freeze())],
            )
        }
    };

    let mut inventory = BytesMut::with_capacity(3);
    inventory.put_u16(spec.inventory_parameter_spec_id);
    inventory.put_u8(PROTOCOL_EPC_C1G2);

    Parameter::tlv(
        tlv::AI_SPEC,
        antennas.freeze(),
        vec![
            stop,
            Parameter::leaf(tlv::INVENTORY_PARAMETER_SPEC, inventory.freeze()),
        ],
    )
}

fn ai_stop_trigger(trigger_type: u8, duration_ms: u32, children: Vec<Parameter>) -> Parameter {
    let mut fields = BytesMut::with_capacity(5);
    fields.put_u8(trigger_type);
    fields.put_u32(duration_ms);
    Parameter::tlv(tlv::AI_SPEC_STOP_TRIGGER, fields.freeze(), children)
}

/// The ROSpec command message for a lifecycle operation.
pub fn command_message(op: &RoSpecOp) -> Message {
    match op {
        RoSpecOp::Add(spec) => add_rospec_message(spec),
        RoSpecOp::Enable(id) => Message::rospec_command(MessageType::EnableRoSpec, *id),
        RoSpecOp::Start(id) => Message::rospec_command(MessageType::StartRoSpec, *id),
        RoSpecOp::Stop(id) => Message::rospec_command(MessageType::StopRoSpec, *id),
        RoSpecOp::Disable(id) => Message::rospec_command(MessageType::DisableRoSpec, *id),
        RoSpecOp::Delete(id) => Message::rospec_command(MessageType::DeleteRoSpec, *id),
        RoSpecOp::Reconcile => Message::get_rospecs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{status_response, LlrpStatus};

    fn ok(ty: MessageType) -> Message {
        status_response(ty, 1, &LlrpStatus::success())
    }

    fn table_with(id: u32, state: RoSpecState) -> RoSpecTable {
        let mut table = RoSpecTable::new();
        table.entries.insert(
            id,
            RoSpecEntry {
                id,
                state,
                spec: None,
            },
        );
        table
    }

    #[test]
    fn full_lifecycle() {
        let mut table = RoSpecTable::new();
        let spec = RoSpecConfig::default();

        assert_eq!(table.check_add(1).unwrap(), Precheck::Forward);
        table.apply(&RoSpecOp::Add(spec), &ok(MessageType::AddRoSpecResponse));
        assert_eq!(table.state(1), RoSpecState::Disabled);

        table.check_enable(1).unwrap();
        table.apply(&RoSpecOp::Enable(1), &ok(MessageType::EnableRoSpecResponse));
        assert_eq!(table.state(1), RoSpecState::Inactive);

        table.check_start(1).unwrap();
        table.apply(&RoSpecOp::Start(1), &ok(MessageType::StartRoSpecResponse));
        assert_eq!(table.state(1), RoSpecState::Active);

        assert_eq!(table.check_stop(1).unwrap(), Precheck::Forward);
        table.apply(&RoSpecOp::Stop(1), &ok(MessageType::StopRoSpecResponse));
        assert_eq!(table.state(1), RoSpecState::Inactive);

        table.apply(&RoSpecOp::Delete(1), &ok(MessageType::DeleteRoSpecResponse));
        assert_eq!(table.state(1), RoSpecState::Deleted);
        assert!(matches!(table.check_start(1), Err(ClientError::UnknownId(1))));
    }

    #[test]
    fn start_from_disabled_is_not_enabled() {
        let table = table_with(1, RoSpecState::Disabled);
        assert!(matches!(table.check_start(1), Err(ClientError::NotEnabled(1))));
        assert_eq!(table.state(1), RoSpecState::Disabled);
    }

    #[test]
    fn stop_while_inactive_needs_no_round_trip() {
        let table = table_with(1, RoSpecState::Inactive);
        assert_eq!(table.check_stop(1).unwrap(), Precheck::AlreadyDone);
        assert_eq!(table.check_stop(1).unwrap(), Precheck::AlreadyDone);
        assert_eq!(table.state(1), RoSpecState::Inactive);
    }

    #[test]
    fn unknown_ids_are_rejected_locally() {
        let table = RoSpecTable::new();
        assert!(matches!(table.check_enable(9), Err(ClientError::UnknownId(9))));
        assert!(matches!(table.check_stop(9), Err(ClientError::UnknownId(9))));
        assert!(matches!(table.check_disable(9), Err(ClientError::UnknownId(9))));
        assert_eq!(table.check_delete(9).unwrap(), Precheck::Forward);
    }

    #[test]
    fn add_rules() {
        let table = table_with(3, RoSpecState::Inactive);
        assert!(matches!(table.check_add(0), Err(ClientError::InvalidRoSpecId)));
        assert!(matches!(table.check_add(3), Err(ClientError::DuplicateId(3))));

        let table = table_with(3, RoSpecState::Deleted);
        assert_eq!(table.check_add(3).unwrap(), Precheck::Forward);
    }

    #[test]
    fn delete_all_marks_every_entry() {
        let mut table = table_with(1, RoSpecState::Active);
        table.entries.insert(
            2,
            RoSpecEntry {
                id: 2,
                state: RoSpecState::Disabled,
                spec: None,
            },
        );
        table.apply(&RoSpecOp::Delete(ALL_ROSPECS), &ok(MessageType::DeleteRoSpecResponse));
        assert_eq!(table.state(1), RoSpecState::Deleted);
        assert_eq!(table.state(2), RoSpecState::Deleted);

        let mut empty = RoSpecTable::new();
        empty.apply(&RoSpecOp::Delete(ALL_ROSPECS), &ok(MessageType::DeleteRoSpecResponse));
        assert!(empty.entries().is_empty());
    }

    #[test]
    fn reader_events_track_trigger_driven_runs() {
        let mut table = table_with(5, RoSpecState::Inactive);
        table.apply_reader_event(ROSPEC_EVENT_START, 5);
        assert_eq!(table.state(5), RoSpecState::Active);
        table.apply_reader_event(ROSPEC_EVENT_END, 5);
        assert_eq!(table.state(5), RoSpecState::Inactive);

        table.apply_reader_event(ROSPEC_EVENT_START, 77);
        assert_eq!(table.state(77), RoSpecState::Unknown);
    }

    #[test]
    fn reconcile_from_get_rospecs_response() {
        let mut table = table_with(1, RoSpecState::Active);
        let mut response = ok(MessageType::GetRoSpecsResponse);
        let mut listed = RoSpecConfig {
            id: 2,
            ..RoSpecConfig::default()
        };
        listed.priority = 1;
        let mut param = rospec_parameter(&listed);
        if let Parameter::Tlv { fields, .. } = &mut param {
            let mut raw = fields.to_vec();
            raw[5] = 1; // Inactive
            *fields = raw.into();
        }
        response.parameters.push(param);

        table.apply(&RoSpecOp::Reconcile, &response);
        assert_eq!(table.state(1), RoSpecState::Deleted);
        assert_eq!(table.state(2), RoSpecState::Inactive);
        assert_eq!(
            rospec_summaries(&response),
            vec![RoSpecSummary {
                id: 2,
                priority: 1,
                state: RoSpecState::Inactive,
            }]
        );
    }

    #[test]
    fn rospec_parameter_encodes_and_decodes() {
        let spec = RoSpecConfig {
            id: 42,
            antennas: vec![1, 2],
            start_trigger: StartTrigger::Periodic {
                offset_ms: 0,
                period_ms: 1000,
            },
            ai_stop_trigger: AiSpecStopTrigger::TagObservation {
                tag_count: 10,
                timeout_ms: 500,
            },
            ..RoSpecConfig::default()
        };
        let message = add_rospec_message(&spec).with_id(1);
        let decoded = Message::decode(&message.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, message);

        let rospec = decoded.find(tlv::RO_SPEC).unwrap();
        assert_eq!(&rospec.fields()[..4], &42u32.to_be_bytes());
        let ai = rospec.find(tlv::AI_SPEC).unwrap();
        assert_eq!(ai.fields(), &[0, 2, 0, 1, 0, 2]);
        assert!(ai
            .find(tlv::AI_SPEC_STOP_TRIGGER)
            .unwrap()
            .find(tlv::TAG_OBSERVATION_TRIGGER)
            .is_some());
        let report = rospec.find(tlv::RO_REPORT_SPEC).unwrap();
        assert_eq!(report.fields(), &[1, 0, 1]);
    }

    #[test]
    fn command_messages_carry_ids() {
        assert_eq!(command_message(&RoSpecOp::Start(7)).rospec_id(), Some(7));
        assert_eq!(
            command_message(&RoSpecOp::Delete(ALL_ROSPECS)).message_type,
            MessageType::DeleteRoSpec
        );
        assert_eq!(
            command_message(&RoSpecOp::Reconcile).message_type,
            MessageType::GetRoSpecs
        );
    }
}
