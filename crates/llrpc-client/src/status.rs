//! LLRPStatus, the status block carried by every reader response.

use bytes::Bytes;
use llrpc_frame::param::tlv;
use llrpc_frame::{Message, MessageType, Parameter};
use serde::Serialize;

use crate::error::{ClientError, Result};
use crate::fields::FieldReader;

pub const STATUS_SUCCESS: u16 = 0;
pub const STATUS_PARAMETER_ERROR: u16 = 100;
pub const STATUS_FIELD_ERROR: u16 = 101;

/// Standard name for an LLRP status code.
pub fn status_name(code: u16) -> &'static str {
    match code {
        0 => "M_Success",
        100 => "M_ParameterError",
        101 => "M_FieldError",
        102 => "M_UnexpectedParameter",
        103 => "M_MissingParameter",
        104 => "M_DuplicateParameter",
        105 => "M_OverflowParameter",
        106 => "M_OverflowField",
        107 => "M_UnknownParameter",
        108 => "M_UnknownField",
        109 => "M_UnsupportedMessage",
        110 => "M_UnsupportedVersion",
        111 => "M_UnsupportedParameter",
        112 => "M_UnexpectedMessage",
        200 => "P_ParameterError",
        201 => "P_FieldError",
        202 => "P_UnexpectedParameter",
        203 => "P_MissingParameter",
        204 => "P_DuplicateParameter",
        205 => "P_OverflowParameter",
        206 => "P_OverflowField",
        207 => "P_UnknownParameter",
        208 => "P_UnknownField",
        209 => "P_UnsupportedParameter",
        300 => "A_Invalid",
        301 => "A_OutOfRange",
        401 => "R_DeviceError",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field_num: u16,
    pub error_code: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterError {
    pub parameter_type: u16,
    pub error_code: u16,
    pub field_error: Option<FieldError>,
    pub parameter_error: Option<Box<ParameterError>>,
}

/// A decoded LLRPStatus parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LlrpStatus {
    pub code: u16,
    pub name: &'static str,
    pub description: String,
    pub field_error: Option<FieldError>,
    pub parameter_error: Option<ParameterError>,
}

impl LlrpStatus {
    pub fn success() -> Self {
        Self {
            code: STATUS_SUCCESS,
            name: status_name(STATUS_SUCCESS),
            description: String::new(),
            field_error: None,
            parameter_error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == STATUS_SUCCESS
    }

    /// Project an LLRPStatus parameter. `None` if it is not one.
    pub fn from_parameter(param: &Parameter) -> Option<Self> {
        if param.param_type() != tlv::LLRP_STATUS {
            return None;
        }
        let mut fields = FieldReader::new(param.fields());
        let code = fields.u16()?;
        let description = fields.utf8v()?;
        Some(Self {
            code,
            name: status_name(code),
            description,
            field_error: param.find(tlv::FIELD_ERROR).and_then(field_error),
            parameter_error: param.find(tlv::PARAMETER_ERROR).and_then(parameter_error),
        })
    }

    /// The status of a response message.
    ///
    /// A response without an LLRPStatus is a protocol violation.
    pub fn from_message(message: &Message) -> Result<Self> {
        message
            .status()
            .and_then(Self::from_parameter)
            .ok_or_else(|| {
                ClientError::ProtocolViolation(format!(
                    "{} (id {}) carries no LLRPStatus",
                    message.message_type, message.message_id
                ))
            })
    }

    /// True if the reader blamed the ROSpecID field of a ROSpec parameter.
    ///
    /// Readers report an ADD_ROSPEC with an ID already in use this way.
    pub fn names_rospec_id(&self) -> bool {
        self.parameter_error.as_ref().is_some_and(|err| {
            err.parameter_type == tlv::RO_SPEC
                && err
                    .field_error
                    .as_ref()
                    .is_some_and(|field| field.field_num == 0)
        })
    }

    /// Convert a failure status into `ReaderRejected`.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let description = if self.description.is_empty() {
            self.name.to_string()
        } else {
            format!("{}: {}", self.name, self.description)
        };
        Err(ClientError::ReaderRejected {
            status_code: self.code,
            description,
        })
    }

    /// Encode as an LLRPStatus parameter.
    pub fn to_parameter(&self) -> Parameter {
        let mut fields = Vec::with_capacity(4 + self.description.len());
        fields.extend_from_slice(&self.code.to_be_bytes());
        fields.extend_from_slice(&(self.description.len() as u16).to_be_bytes());
        fields.extend_from_slice(self.description.as_bytes());

        let mut children = Vec::new();
        if let Some(field) = &self.field_error {
            children.push(field_error_param(field));
        }
        if let Some(param) = &self.parameter_error {
            children.push(parameter_error_param(param));
        }
        Parameter::tlv(tlv::LLRP_STATUS, fields, children)
    }
}

/// Build a response message carrying `status`.
pub fn status_response(message_type: MessageType, message_id: u32, status: &LlrpStatus) -> Message {
    Message::new(message_type, Bytes::new(), vec![status.to_parameter()]).with_id(message_id)
}

fn field_error(param: &Parameter) -> Option<FieldError> {
    let mut fields = FieldReader::new(param.fields());
    Some(FieldError {
        field_num: fields.u16()?,
        error_code: fields.u16()?,
    })
}

fn parameter_error(param: &Parameter) -> Option<ParameterError> {
    let mut fields = FieldReader::new(param.fields());
    Some(ParameterError {
        parameter_type: fields.u16()?,
        error_code: fields.u16()?,
        field_error: param.find(tlv::FIELD_ERROR).and_then(field_error),
        parameter_error: param
            .find(tlv::PARAMETER_ERROR)
            .and_then(parameter_error)
            .map(Box::new),
    })
}

fn field_error_param(err: &FieldError) -> Parameter {
    let mut fields = Vec::with_capacity(4);
    fields.extend_from_slice(&err.field_num.to_be_bytes());
    fields.extend_from_slice(&err.error_code.to_be_bytes());
    Parameter::leaf(tlv::FIELD_ERROR, fields)
}

fn parameter_error_param(err: &ParameterError) -> Parameter {
    let mut fields = Vec::with_capacity(4);
    fields.extend_from_slice(&err.parameter_type.to_be_bytes());
    fields.extend_from_slice(&err.error_code.to_be_bytes());
    let mut children = Vec::new();
    if let Some(field) = &err.field_error {
        children.push(field_error_param(field));
    }
    if let Some(nested) = &err.parameter_error {
        children.push(parameter_error_param(nested));
    }
    Parameter::tlv(tlv::PARAMETER_ERROR, fields, children)
}
