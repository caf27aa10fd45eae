//! Scripted reader for session and client tests.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use llrpc_frame::param::{tlv, tv};
use llrpc_frame::{FrameReader, FrameWriter, Message, MessageType, Parameter};
use llrpc_transport::LlrpStream;

use crate::client::Client;
use crate::config::ClientConfig;
use crate::status::{status_response, LlrpStatus, STATUS_PARAMETER_ERROR};

pub(crate) fn test_config() -> ClientConfig {
    ClientConfig {
        connect_timeout_ms: 2000,
        response_timeout_ms: 2000,
        close_grace_ms: 500,
        ..ClientConfig::new("mock-reader")
    }
}

fn event_notification(events: Vec<Parameter>) -> Message {
    let mut children = vec![Parameter::leaf(
        tlv::UTC_TIMESTAMP,
        1_700_000_000_000_000u64.to_be_bytes().to_vec(),
    )];
    children.extend(events);
    Message::new(
        MessageType::ReaderEventNotification,
        Bytes::new(),
        vec![Parameter::tlv(
            tlv::READER_EVENT_NOTIFICATION_DATA,
            Bytes::new(),
            children,
        )],
    )
}

pub(crate) fn connection_event(status: u16) -> Message {
    event_notification(vec![Parameter::leaf(
        tlv::CONNECTION_ATTEMPT_EVENT,
        status.to_be_bytes().to_vec(),
    )])
}

pub(crate) fn rospec_event(event_type: u8, rospec_id: u32) -> Message {
    let mut fields = BytesMut::with_capacity(9);
    fields.put_u8(event_type);
    fields.put_u32(rospec_id);
    fields.put_u32(0);
    event_notification(vec![Parameter::leaf(tlv::RO_SPEC_EVENT, fields.freeze())])
}

pub(crate) fn access_report(epcs: &[[u8; 12]]) -> Message {
    let tags = epcs
        .iter()
        .map(|epc| {
            Parameter::tlv(
                tlv::TAG_REPORT_DATA,
                Bytes::new(),
                vec![
                    Parameter::tv(tv::EPC_96, epc.to_vec()),
                    Parameter::tv(tv::ANTENNA_ID, vec![0u8, 1]),
                ],
            )
        })
        .collect();
    Message::new(MessageType::RoAccessReport, Bytes::new(), tags)
}

/// Status naming field 0 of the ROSpec parameter, as readers send for a
/// duplicate ROSpecID.
pub(crate) fn duplicate_rospec_status() -> LlrpStatus {
    use crate::status::{status_name, FieldError, ParameterError};

    LlrpStatus {
        code: STATUS_PARAMETER_ERROR,
        name: status_name(STATUS_PARAMETER_ERROR),
        description: "ROSpecID in use".to_string(),
        field_error: None,
        parameter_error: Some(ParameterError {
            parameter_type: tlv::RO_SPEC,
            error_code: 201,
            field_error: Some(FieldError {
                field_num: 0,
                error_code: 300,
            }),
            parameter_error: None,
        }),
    }
}

pub(crate) struct MockReader {
    pub(crate) reader: FrameReader<UnixStream>,
    writer: FrameWriter<UnixStream>,
}

impl MockReader {
    pub(crate) fn new(stream: UnixStream) -> Self {
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let read_half = stream.try_clone().unwrap();
        Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(stream),
        }
    }

    pub(crate) fn recv(&mut self) -> Message {
        self.reader.read_message().unwrap()
    }

    pub(crate) fn expect(&mut self, message_type: MessageType) -> Message {
        let message = self.recv();
        assert_eq!(message.message_type, message_type, "unexpected request");
        message
    }

    pub(crate) fn send(&mut self, message: &Message) {
        self.writer.write_message(message).unwrap();
    }

    pub(crate) fn reply(&mut self, request: &Message, status: &LlrpStatus) {
        let response_type = request.message_type.response_type().unwrap();
        self.send(&status_response(response_type, request.message_id, status));
    }

    pub(crate) fn reply_ok(&mut self, request: &Message) {
        self.reply(request, &LlrpStatus::success());
    }

    /// Reply with success status plus `extra` parameters.
    pub(crate) fn reply_with(&mut self, request: &Message, extra: Vec<Parameter>) {
        let response_type = request.message_type.response_type().unwrap();
        let mut response =
            status_response(response_type, request.message_id, &LlrpStatus::success());
        response.parameters.extend(extra);
        self.send(&response);
    }

    /// Write bytes as-is, ignoring errors: the client may already have hung up.
    pub(crate) fn send_raw(&mut self, bytes: &[u8]) {
        let _ = self.writer.get_mut().write_all(bytes);
    }

    /// Answer CLOSE_CONNECTION and hang up.
    pub(crate) fn accept_close(mut self) {
        let request = self.expect(MessageType::CloseConnection);
        self.reply_ok(&request);
    }
}

/// A connected client and the reader end, handshake already done.
pub(crate) fn connected(config: ClientConfig) -> (Client, MockReader) {
    let (client_end, reader_end) = UnixStream::pair().unwrap();
    let mut reader = MockReader::new(reader_end);
    reader.send(&connection_event(0));
    let client = Client::from_stream(LlrpStream::from_unix(client_end), config).unwrap();
    (client, reader)
}
