use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{
    encode_frame, FrameHeader, RawFrame, HEADER_SIZE, LLRP_VERSION_1, LLRP_VERSION_2,
};
use crate::error::{DecodeError, Result};
use crate::message_type::MessageType;
use crate::param::{self, tlv, Parameter};

/// A decoded LLRP message: header fields, leading fixed fields, parameters.
///
/// `fields` holds the per-type fixed block (see [`MessageType::fixed_len`]);
/// `parameters` holds the TV/TLV tree that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: u8,
    pub message_type: MessageType,
    pub message_id: u32,
    pub fields: Bytes,
    pub parameters: Vec<Parameter>,
}

impl Message {
    /// Build a version-1 message with ID 0. The session assigns the real ID.
    pub fn new(
        message_type: MessageType,
        fields: impl Into<Bytes>,
        parameters: Vec<Parameter>,
    ) -> Self {
        Self {
            version: LLRP_VERSION_1,
            message_type,
            message_id: 0,
            fields: fields.into(),
            parameters,
        }
    }

    /// Set the message ID.
    pub fn with_id(mut self, message_id: u32) -> Self {
        self.message_id = message_id;
        self
    }

    /// Set the protocol version.
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn get_reader_capabilities(requested_data: u8) -> Self {
        Self::new(MessageType::GetReaderCapabilities, vec![requested_data], Vec::new())
    }

    pub fn get_reader_config(
        antenna_id: u16,
        requested_data: u8,
        gpi_port: u16,
        gpo_port: u16,
    ) -> Self {
        let mut fields = BytesMut::with_capacity(7);
        fields.put_u16(antenna_id);
        fields.put_u8(requested_data);
        fields.put_u16(gpi_port);
        fields.put_u16(gpo_port);
        Self::new(MessageType::GetReaderConfig, fields.freeze(), Vec::new())
    }

    pub fn set_reader_config(reset_to_factory_default: bool, parameters: Vec<Parameter>) -> Self {
        let flags = if reset_to_factory_default { 0x80 } else { 0x00 };
        Self::new(MessageType::SetReaderConfig, vec![flags], parameters)
    }

    pub fn add_rospec(rospec: Parameter) -> Self {
        Self::new(MessageType::AddRoSpec, Bytes::new(), vec![rospec])
    }

    /// ENABLE/DISABLE/START/STOP/DELETE_ROSPEC carrying a single ROSpec ID.
    pub fn rospec_command(message_type: MessageType, rospec_id: u32) -> Self {
        Self::new(message_type, rospec_id.to_be_bytes().to_vec(), Vec::new())
    }

    pub fn get_rospecs() -> Self {
        Self::new(MessageType::GetRoSpecs, Bytes::new(), Vec::new())
    }

    pub fn enable_events_and_reports() -> Self {
        Self::new(MessageType::EnableEventsAndReports, Bytes::new(), Vec::new())
    }

    pub fn keepalive_ack() -> Self {
        Self::new(MessageType::KeepAliveAck, Bytes::new(), Vec::new())
    }

    pub fn close_connection() -> Self {
        Self::new(MessageType::CloseConnection, Bytes::new(), Vec::new())
    }

    pub fn get_report() -> Self {
        Self::new(MessageType::GetReport, Bytes::new(), Vec::new())
    }

    /// The ROSpec ID carried by ROSpec command messages.
    pub fn rospec_id(&self) -> Option<u32> {
        if self.message_type.fixed_len() != 4 || self.fields.len() < 4 {
            return None;
        }
        Some(u32::from_be_bytes([
            self.fields[0],
            self.fields[1],
            self.fields[2],
            self.fields[3],
        ]))
    }

    /// First top-level parameter with the given type.
    pub fn find(&self, param_type: u16) -> Option<&Parameter> {
        param::find(&self.parameters, param_type)
    }

    /// All top-level parameters with the given type.
    pub fn find_all(&self, param_type: u16) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(move |p| p.param_type() == param_type)
    }

    /// The top-level LLRPStatus parameter, present on every response.
    pub fn status(&self) -> Option<&Parameter> {
        self.find(tlv::LLRP_STATUS)
    }

    /// Body length (fixed fields + encoded parameters).
    pub fn body_len(&self) -> usize {
        self.fields.len() + self.parameters.iter().map(Parameter::encoded_len).sum::<usize>()
    }

    /// Total wire length, header included.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.body_len()
    }

    /// Append the full frame for this message to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        let mut body = BytesMut::with_capacity(self.body_len());
        body.put_slice(&self.fields);
        for param in &self.parameters {
            param.encode(&mut body)?;
        }
        encode_frame(
            self.version,
            self.message_type.as_u16(),
            self.message_id,
            &body,
            dst,
        )
    }

    /// Encode into a standalone buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut dst)?;
        Ok(dst.freeze())
    }

    /// Decode exactly one message spanning all of `src`.
    ///
    /// The declared length must equal `src.len()`.
    pub fn decode(src: &[u8]) -> std::result::Result<Self, DecodeError> {
        let header = FrameHeader::parse(src).ok_or(DecodeError::LengthMismatch {
            declared: HEADER_SIZE,
            actual: src.len(),
        })?;
        let declared = header.length as usize;
        if declared != src.len() {
            return Err(DecodeError::LengthMismatch {
                declared,
                actual: src.len(),
            });
        }
        Self::from_frame(RawFrame {
            header,
            body: Bytes::copy_from_slice(&src[HEADER_SIZE..]),
        })
    }

    /// Validate a frame cut by the reader and decode its body.
    pub fn from_frame(frame: RawFrame) -> std::result::Result<Self, DecodeError> {
        let RawFrame { header, body } = frame;

        if header.reserved != 0 {
            return Err(DecodeError::MalformedEnvelope(format!(
                "reserved header bits set ({:#05b})",
                header.reserved
            )));
        }
        if header.version != LLRP_VERSION_1 && header.version != LLRP_VERSION_2 {
            return Err(DecodeError::MalformedEnvelope(format!(
                "unsupported protocol version {}",
                header.version
            )));
        }
        if header.body_len() != body.len() {
            return Err(DecodeError::LengthMismatch {
                declared: header.length as usize,
                actual: HEADER_SIZE + body.len(),
            });
        }
        let message_type = MessageType::from_u16(header.message_type).ok_or_else(|| {
            DecodeError::MalformedEnvelope(format!(
                "unrecognized message type {}",
                header.message_type
            ))
        })?;

        let fixed = message_type.fixed_len();
        if body.len() < fixed {
            return Err(DecodeError::MalformedEnvelope(format!(
                "{message_type} body is {} bytes, fixed fields need {fixed}",
                body.len()
            )));
        }

        let fields = body.slice(..fixed);
        let parameters = Parameter::decode_all(&body.slice(fixed..))?;

        Ok(Self {
            version: header.version,
            message_type,
            message_id: header.message_id,
            fields,
            parameters,
        })
    }
}
