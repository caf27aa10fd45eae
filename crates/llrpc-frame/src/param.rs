//! LLRP parameter tree codec.
//!
//! Parameters come in two encodings:
//! - TV: high bit set, 7-bit type, fixed-size value (size known per type)
//! - TLV: 6 reserved bits, 10-bit type, 16-bit length covering the 4-byte
//!   header, then the leading fields and nested child parameters
//!
//! Known TLV types carry a layout telling where the leading fields end and
//! the children begin. Unknown TLV types are preserved as opaque blobs and
//! re-encoded verbatim. Unknown TV types cannot be skipped (no length on the
//! wire) and fail decoding.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, FrameError, Result};

/// TV parameter types.
pub mod tv {
    pub const ANTENNA_ID: u8 = 1;
    pub const FIRST_SEEN_TIMESTAMP_UTC: u8 = 2;
    pub const FIRST_SEEN_TIMESTAMP_UPTIME: u8 = 3;
    pub const LAST_SEEN_TIMESTAMP_UTC: u8 = 4;
    pub const LAST_SEEN_TIMESTAMP_UPTIME: u8 = 5;
    pub const PEAK_RSSI: u8 = 6;
    pub const CHANNEL_INDEX: u8 = 7;
    pub const TAG_SEEN_COUNT: u8 = 8;
    pub const RO_SPEC_ID: u8 = 9;
    pub const INVENTORY_PARAMETER_SPEC_ID: u8 = 10;
    pub const C1G2_CRC: u8 = 11;
    pub const C1G2_PC: u8 = 12;
    pub const EPC_96: u8 = 13;
    pub const SPEC_INDEX: u8 = 14;
    pub const CLIENT_REQUEST_OP_SPEC_RESULT: u8 = 15;
    pub const ACCESS_SPEC_ID: u8 = 16;
    pub const OP_SPEC_ID: u8 = 17;
    pub const C1G2_SINGULATION_DETAILS: u8 = 18;
    pub const C1G2_XPCW1: u8 = 19;
    pub const C1G2_XPCW2: u8 = 20;

    /// Value length (excluding the type byte) for a TV type.
    pub fn value_len(param_type: u8) -> Option<usize> {
        let len = match param_type {
            ANTENNA_ID => 2,
            FIRST_SEEN_TIMESTAMP_UTC
            | FIRST_SEEN_TIMESTAMP_UPTIME
            | LAST_SEEN_TIMESTAMP_UTC
            | LAST_SEEN_TIMESTAMP_UPTIME => 8,
            PEAK_RSSI => 1,
            CHANNEL_INDEX | TAG_SEEN_COUNT | INVENTORY_PARAMETER_SPEC_ID => 2,
            RO_SPEC_ID | ACCESS_SPEC_ID | C1G2_SINGULATION_DETAILS => 4,
            C1G2_CRC | C1G2_PC | SPEC_INDEX | CLIENT_REQUEST_OP_SPEC_RESULT | OP_SPEC_ID => 2,
            C1G2_XPCW1 | C1G2_XPCW2 => 2,
            EPC_96 => 12,
            _ => return None,
        };
        Some(len)
    }
}

/// TLV parameter types.
pub mod tlv {
    pub const UTC_TIMESTAMP: u16 = 128;
    pub const UPTIME: u16 = 129;
    pub const GENERAL_DEVICE_CAPABILITIES: u16 = 137;
    pub const RECEIVE_SENSITIVITY_TABLE_ENTRY: u16 = 139;
    pub const GPIO_CAPABILITIES: u16 = 141;
    pub const LLRP_CAPABILITIES: u16 = 142;
    pub const REGULATORY_CAPABILITIES: u16 = 143;
    pub const FREQUENCY_HOP_TABLE: u16 = 147;
    pub const FIXED_FREQUENCY_TABLE: u16 = 148;
    pub const RO_SPEC: u16 = 177;
    pub const RO_BOUNDARY_SPEC: u16 = 178;
    pub const RO_SPEC_START_TRIGGER: u16 = 179;
    pub const PERIODIC_TRIGGER_VALUE: u16 = 180;
    pub const GPI_TRIGGER_VALUE: u16 = 181;
    pub const RO_SPEC_STOP_TRIGGER: u16 = 182;
    pub const AI_SPEC: u16 = 183;
    pub const AI_SPEC_STOP_TRIGGER: u16 = 184;
    pub const TAG_OBSERVATION_TRIGGER: u16 = 185;
    pub const INVENTORY_PARAMETER_SPEC: u16 = 186;
    pub const LLRP_CONFIGURATION_STATE_VALUE: u16 = 217;
    pub const IDENTIFICATION: u16 = 218;
    pub const GPO_WRITE_DATA: u16 = 219;
    pub const KEEPALIVE_SPEC: u16 = 220;
    pub const ANTENNA_PROPERTIES: u16 = 221;
    pub const ANTENNA_CONFIGURATION: u16 = 222;
    pub const RF_RECEIVER: u16 = 223;
    pub const RF_TRANSMITTER: u16 = 224;
    pub const GPI_PORT_CURRENT_STATE: u16 = 225;
    pub const EVENTS_AND_REPORTS: u16 = 226;
    pub const RO_REPORT_SPEC: u16 = 237;
    pub const TAG_REPORT_CONTENT_SELECTOR: u16 = 238;
    pub const ACCESS_REPORT_SPEC: u16 = 239;
    pub const TAG_REPORT_DATA: u16 = 240;
    pub const EPC_DATA: u16 = 241;
    pub const READER_EVENT_NOTIFICATION_SPEC: u16 = 244;
    pub const EVENT_NOTIFICATION_STATE: u16 = 245;
    pub const READER_EVENT_NOTIFICATION_DATA: u16 = 246;
    pub const RO_SPEC_EVENT: u16 = 249;
    pub const REPORT_BUFFER_LEVEL_WARNING_EVENT: u16 = 250;
    pub const REPORT_BUFFER_OVERFLOW_ERROR_EVENT: u16 = 251;
    pub const READER_EXCEPTION_EVENT: u16 = 252;
    pub const ANTENNA_EVENT: u16 = 255;
    pub const CONNECTION_ATTEMPT_EVENT: u16 = 256;
    pub const CONNECTION_CLOSE_EVENT: u16 = 257;
    pub const LLRP_STATUS: u16 = 287;
    pub const FIELD_ERROR: u16 = 288;
    pub const PARAMETER_ERROR: u16 = 289;
    pub const C1G2_EPC_MEMORY_SELECTOR: u16 = 348;
    pub const CUSTOM_PARAMETER: u16 = 1023;
}

const TV_FLAG: u8 = 0x80;
const TLV_HEADER_SIZE: usize = 4;
const TLV_TYPE_MASK: u16 = 0x03FF;
const FIRST_TLV_TYPE: u16 = 128;

/// Where the leading fields of a known TLV end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Exactly `n` bytes of fields.
    Fields(usize),
    /// `prefix` bytes, a u16 element count, then `count * elem` bytes.
    Array { prefix: usize, elem: usize },
    /// A u16 bit count followed by `ceil(bits / 8)` bytes.
    Bits,
}

fn layout(param_type: u16) -> Option<Layout> {
    use tlv::*;

    let layout = match param_type {
        UTC_TIMESTAMP | UPTIME => Layout::Fields(8),
        GENERAL_DEVICE_CAPABILITIES => Layout::Array {
            prefix: 12,
            elem: 1,
        },
        RECEIVE_SENSITIVITY_TABLE_ENTRY | GPIO_CAPABILITIES | REGULATORY_CAPABILITIES => {
            Layout::Fields(4)
        }
        LLRP_CAPABILITIES => Layout::Fields(24),
        FREQUENCY_HOP_TABLE => Layout::Array { prefix: 2, elem: 4 },
        FIXED_FREQUENCY_TABLE => Layout::Array { prefix: 0, elem: 4 },
        RO_SPEC => Layout::Fields(6),
        RO_BOUNDARY_SPEC | TAG_REPORT_DATA | READER_EVENT_NOTIFICATION_SPEC => Layout::Fields(0),
        READER_EVENT_NOTIFICATION_DATA | REPORT_BUFFER_OVERFLOW_ERROR_EVENT => Layout::Fields(0),
        CONNECTION_CLOSE_EVENT => Layout::Fields(0),
        RO_SPEC_START_TRIGGER | EVENTS_AND_REPORTS | ACCESS_REPORT_SPEC => Layout::Fields(1),
        REPORT_BUFFER_LEVEL_WARNING_EVENT | C1G2_EPC_MEMORY_SELECTOR => Layout::Fields(1),
        PERIODIC_TRIGGER_VALUE => Layout::Fields(8),
        GPI_TRIGGER_VALUE => Layout::Fields(7),
        RO_SPEC_STOP_TRIGGER | AI_SPEC_STOP_TRIGGER | KEEPALIVE_SPEC => Layout::Fields(5),
        AI_SPEC => Layout::Array { prefix: 0, elem: 2 },
        TAG_OBSERVATION_TRIGGER => Layout::Fields(12),
        INVENTORY_PARAMETER_SPEC | RO_REPORT_SPEC | GPO_WRITE_DATA => Layout::Fields(3),
        EVENT_NOTIFICATION_STATE | ANTENNA_EVENT => Layout::Fields(3),
        LLRP_CONFIGURATION_STATE_VALUE | GPI_PORT_CURRENT_STATE => Layout::Fields(4),
        FIELD_ERROR | PARAMETER_ERROR => Layout::Fields(4),
        IDENTIFICATION => Layout::Array { prefix: 1, elem: 1 },
        ANTENNA_CONFIGURATION | RF_RECEIVER | TAG_REPORT_CONTENT_SELECTOR => Layout::Fields(2),
        CONNECTION_ATTEMPT_EVENT => Layout::Fields(2),
        RF_TRANSMITTER => Layout::Fields(6),
        ANTENNA_PROPERTIES => Layout::Fields(5),
        EPC_DATA => Layout::Bits,
        RO_SPEC_EVENT => Layout::Fields(9),
        READER_EXCEPTION_EVENT => Layout::Array { prefix: 0, elem: 1 },
        LLRP_STATUS => Layout::Array { prefix: 2, elem: 1 },
        _ => return None,
    };
    Some(layout)
}

/// True if the TLV type has a known layout and decodes into fields + children.
pub fn is_known_tlv(param_type: u16) -> bool {
    layout(param_type).is_some()
}

/// A decoded LLRP parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    /// Type-value parameter with a fixed-size value.
    Tv { param_type: u8, value: Bytes },
    /// Type-length-value parameter of a known type.
    Tlv {
        param_type: u16,
        fields: Bytes,
        children: Vec<Parameter>,
    },
    /// TLV parameter of an unrecognized type, kept verbatim.
    Opaque { param_type: u16, body: Bytes },
}

impl Parameter {
    /// Build a TV parameter.
    pub fn tv(param_type: u8, value: impl Into<Bytes>) -> Self {
        Parameter::Tv {
            param_type,
            value: value.into(),
        }
    }

    /// Build a TLV parameter with leading fields and children.
    pub fn tlv(param_type: u16, fields: impl Into<Bytes>, children: Vec<Parameter>) -> Self {
        Parameter::Tlv {
            param_type,
            fields: fields.into(),
            children,
        }
    }

    /// Build a TLV parameter without children.
    pub fn leaf(param_type: u16, fields: impl Into<Bytes>) -> Self {
        Self::tlv(param_type, fields, Vec::new())
    }

    /// The parameter type tag (TV types occupy 1-127, TLV types 128-1023).
    pub fn param_type(&self) -> u16 {
        match self {
            Parameter::Tv { param_type, .. } => u16::from(*param_type),
            Parameter::Tlv { param_type, .. } | Parameter::Opaque { param_type, .. } => *param_type,
        }
    }

    /// TV value, TLV leading fields, or the opaque body.
    pub fn fields(&self) -> &[u8] {
        match self {
            Parameter::Tv { value, .. } => value,
            Parameter::Tlv { fields, .. } => fields,
            Parameter::Opaque { body, .. } => body,
        }
    }

    /// Nested child parameters (empty for TV and opaque parameters).
    pub fn children(&self) -> &[Parameter] {
        match self {
            Parameter::Tlv { children, .. } => children,
            _ => &[],
        }
    }

    /// First direct child with the given type.
    pub fn find(&self, param_type: u16) -> Option<&Parameter> {
        find(self.children(), param_type)
    }

    /// All direct children with the given type.
    pub fn find_all(&self, param_type: u16) -> impl Iterator<Item = &Parameter> {
        self.children()
            .iter()
            .filter(move |p| p.param_type() == param_type)
    }

    /// Number of bytes this parameter occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        match self {
            Parameter::Tv { value, .. } => 1 + value.len(),
            Parameter::Tlv {
                fields, children, ..
            } => {
                TLV_HEADER_SIZE
                    + fields.len()
                    + children.iter().map(Self::encoded_len).sum::<usize>()
            }
            Parameter::Opaque { body, .. } => TLV_HEADER_SIZE + body.len(),
        }
    }

    /// Append the wire encoding of this parameter to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        match self {
            Parameter::Tv { param_type, value } => {
                dst.put_u8(TV_FLAG | (param_type & !TV_FLAG));
                dst.put_slice(value);
            }
            Parameter::Tlv {
                param_type,
                fields,
                children,
            } => {
                put_tlv_header(*param_type, self.encoded_len(), dst)?;
                dst.put_slice(fields);
                for child in children {
                    child.encode(dst)?;
                }
            }
            Parameter::Opaque { param_type, body } => {
                put_tlv_header(*param_type, self.encoded_len(), dst)?;
                dst.put_slice(body);
            }
        }
        Ok(())
    }

    /// Decode a full parameter list spanning all of `src`.
    pub fn decode_all(src: &Bytes) -> std::result::Result<Vec<Parameter>, DecodeError> {
        let mut out = Vec::new();
        let mut offset = 0usize;
        while offset < src.len() {
            let rest = src.slice(offset..);
            let (param, used) = Self::decode_one(&rest)?;
            out.push(param);
            offset += used;
        }
        Ok(out)
    }

    /// Decode one parameter from the front of `src`.
    ///
    /// Returns the parameter and the number of bytes it spans.
    pub fn decode_one(src: &Bytes) -> std::result::Result<(Parameter, usize), DecodeError> {
        let Some(&first) = src.first() else {
            return Err(DecodeError::TruncatedParameter {
                param_type: 0,
                needed: 1,
                available: 0,
            });
        };

        if first & TV_FLAG != 0 {
            return decode_tv(src, first & !TV_FLAG);
        }
        decode_tlv(src)
    }
}

/// First parameter in `params` with the given type.
pub fn find(params: &[Parameter], param_type: u16) -> Option<&Parameter> {
    params.iter().find(|p| p.param_type() == param_type)
}

fn put_tlv_header(param_type: u16, len: usize, dst: &mut BytesMut) -> Result<()> {
    let len = u16::try_from(len).map_err(|_| FrameError::ParameterTooLarge {
        param_type,
        size: len,
    })?;
    dst.put_u16(param_type & TLV_TYPE_MASK);
    dst.put_u16(len);
    Ok(())
}

fn decode_tv(src: &Bytes, param_type: u8) -> std::result::Result<(Parameter, usize), DecodeError> {
    let len = tv::value_len(param_type).ok_or_else(|| {
        DecodeError::MalformedEnvelope(format!("unknown TV parameter type {param_type}"))
    })?;
    let needed = 1 + len;
    if src.len() < needed {
        return Err(DecodeError::TruncatedParameter {
            param_type: u16::from(param_type),
            needed,
            available: src.len(),
        });
    }
    Ok((
        Parameter::Tv {
            param_type,
            value: src.slice(1..needed),
        },
        needed,
    ))
}

fn decode_tlv(src: &Bytes) -> std::result::Result<(Parameter, usize), DecodeError> {
    if src.len() < TLV_HEADER_SIZE {
        let param_type = if src.len() >= 2 {
            u16::from_be_bytes([src[0], src[1]]) & TLV_TYPE_MASK
        } else {
            0
        };
        return Err(DecodeError::TruncatedParameter {
            param_type,
            needed: TLV_HEADER_SIZE,
            available: src.len(),
        });
    }

    let mut header = &src[..TLV_HEADER_SIZE];
    let word = header.get_u16();
    let declared = header.get_u16() as usize;
    let param_type = word & TLV_TYPE_MASK;

    if word & !TLV_TYPE_MASK != 0 {
        return Err(DecodeError::MalformedEnvelope(format!(
            "reserved bits set on TLV parameter {param_type}"
        )));
    }
    if param_type < FIRST_TLV_TYPE {
        return Err(DecodeError::MalformedEnvelope(format!(
            "TLV parameter uses TV-range type {param_type}"
        )));
    }
    if declared < TLV_HEADER_SIZE {
        return Err(DecodeError::MalformedEnvelope(format!(
            "TLV parameter {param_type} declares length {declared}"
        )));
    }
    if declared > src.len() {
        return Err(DecodeError::TruncatedParameter {
            param_type,
            needed: declared,
            available: src.len(),
        });
    }

    let body = src.slice(TLV_HEADER_SIZE..declared);
    let Some(layout) = layout(param_type) else {
        return Ok((Parameter::Opaque { param_type, body }, declared));
    };

    let fields_len = fields_len(param_type, layout, &body)?;
    let fields = body.slice(..fields_len);
    let children = Parameter::decode_all(&body.slice(fields_len..))?;

    Ok((
        Parameter::Tlv {
            param_type,
            fields,
            children,
        },
        declared,
    ))
}

fn fields_len(
    param_type: u16,
    layout: Layout,
    body: &[u8],
) -> std::result::Result<usize, DecodeError> {
    let need = |needed: usize| {
        if body.len() < needed {
            Err(DecodeError::TruncatedParameter {
                param_type,
                needed,
                available: body.len(),
            })
        } else {
            Ok(needed)
        }
    };

    match layout {
        Layout::Fields(n) => need(n),
        Layout::Array { prefix, elem } => {
            need(prefix + 2)?;
            let count = u16::from_be_bytes([body[prefix], body[prefix + 1]]) as usize;
            need(prefix + 2 + count * elem)
        }
        Layout::Bits => {
            need(2)?;
            let bits = u16::from_be_bytes([body[0], body[1]]) as usize;
            need(2 + bits.div_ceil(8))
        }
    }
}
