//! LLRP message type tags.
//!
//! Only the 10-bit types this client sends or expects to receive are
//! recognized; any other tag fails decoding.

/// Recognized LLRP message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    GetReaderCapabilities = 1,
    GetReaderCapabilitiesResponse = 11,
    GetReaderConfig = 2,
    GetReaderConfigResponse = 12,
    SetReaderConfig = 3,
    SetReaderConfigResponse = 13,
    CloseConnection = 14,
    CloseConnectionResponse = 4,
    AddRoSpec = 20,
    AddRoSpecResponse = 30,
    DeleteRoSpec = 21,
    DeleteRoSpecResponse = 31,
    StartRoSpec = 22,
    StartRoSpecResponse = 32,
    StopRoSpec = 23,
    StopRoSpecResponse = 33,
    EnableRoSpec = 24,
    EnableRoSpecResponse = 34,
    DisableRoSpec = 25,
    DisableRoSpecResponse = 35,
    GetRoSpecs = 26,
    GetRoSpecsResponse = 36,
    GetReport = 60,
    RoAccessReport = 61,
    KeepAlive = 62,
    KeepAliveAck = 72,
    ReaderEventNotification = 63,
    EnableEventsAndReports = 64,
    ErrorMessage = 100,
}

impl MessageType {
    /// Every recognized type.
    pub const ALL: [MessageType; 29] = [
        MessageType::GetReaderCapabilities,
        MessageType::GetReaderCapabilitiesResponse,
        MessageType::GetReaderConfig,
        MessageType::GetReaderConfigResponse,
        MessageType::SetReaderConfig,
        MessageType::SetReaderConfigResponse,
        MessageType::CloseConnection,
        MessageType::CloseConnectionResponse,
        MessageType::AddRoSpec,
        MessageType::AddRoSpecResponse,
        MessageType::DeleteRoSpec,
        MessageType::DeleteRoSpecResponse,
        MessageType::StartRoSpec,
        MessageType::StartRoSpecResponse,
        MessageType::StopRoSpec,
        MessageType::StopRoSpecResponse,
        MessageType::EnableRoSpec,
        MessageType::EnableRoSpecResponse,
        MessageType::DisableRoSpec,
        MessageType::DisableRoSpecResponse,
        MessageType::GetRoSpecs,
        MessageType::GetRoSpecsResponse,
        MessageType::GetReport,
        MessageType::RoAccessReport,
        MessageType::KeepAlive,
        MessageType::KeepAliveAck,
        MessageType::ReaderEventNotification,
        MessageType::EnableEventsAndReports,
        MessageType::ErrorMessage,
    ];

    /// Look up a wire tag.
    pub fn from_u16(tag: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|ty| ty.as_u16() == tag)
    }

    /// Wire tag.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Protocol name, as written in the LLRP standard.
    pub fn name(self) -> &'static str {
        match self {
            MessageType::GetReaderCapabilities => "GET_READER_CAPABILITIES",
            MessageType::GetReaderCapabilitiesResponse => "GET_READER_CAPABILITIES_RESPONSE",
            MessageType::GetReaderConfig => "GET_READER_CONFIG",
            MessageType::GetReaderConfigResponse => "GET_READER_CONFIG_RESPONSE",
            MessageType::SetReaderConfig => "SET_READER_CONFIG",
            MessageType::SetReaderConfigResponse => "SET_READER_CONFIG_RESPONSE",
            MessageType::CloseConnection => "CLOSE_CONNECTION",
            MessageType::CloseConnectionResponse => "CLOSE_CONNECTION_RESPONSE",
            MessageType::AddRoSpec => "ADD_ROSPEC",
            MessageType::AddRoSpecResponse => "ADD_ROSPEC_RESPONSE",
            MessageType::DeleteRoSpec => "DELETE_ROSPEC",
            MessageType::DeleteRoSpecResponse => "DELETE_ROSPEC_RESPONSE",
            MessageType::StartRoSpec => "START_ROSPEC",
            MessageType::StartRoSpecResponse => "START_ROSPEC_RESPONSE",
            MessageType::StopRoSpec => "STOP_ROSPEC",
            MessageType::StopRoSpecResponse => "STOP_ROSPEC_RESPONSE",
            MessageType::EnableRoSpec => "ENABLE_ROSPEC",
            MessageType::EnableRoSpecResponse => "ENABLE_ROSPEC_RESPONSE",
            MessageType::DisableRoSpec => "DISABLE_ROSPEC",
            MessageType::DisableRoSpecResponse => "DISABLE_ROSPEC_RESPONSE",
            MessageType::GetRoSpecs => "GET_ROSPECS",
            MessageType::GetRoSpecsResponse => "GET_ROSPECS_RESPONSE",
            MessageType::GetReport => "GET_REPORT",
            MessageType::RoAccessReport => "RO_ACCESS_REPORT",
            MessageType::KeepAlive => "KEEPALIVE",
            MessageType::KeepAliveAck => "KEEPALIVE_ACK",
            MessageType::ReaderEventNotification => "READER_EVENT_NOTIFICATION",
            MessageType::EnableEventsAndReports => "ENABLE_EVENTS_AND_REPORTS",
            MessageType::ErrorMessage => "ERROR_MESSAGE",
        }
    }

    /// Length of the fixed fields that precede the parameter list.
    pub fn fixed_len(self) -> usize {
        match self {
            MessageType::GetReaderCapabilities => 1,
            // AntennaID (2), RequestedData (1), GPIPortNum (2), GPOPortNum (2)
            MessageType::GetReaderConfig => 7,
            MessageType::SetReaderConfig => 1,
            MessageType::DeleteRoSpec
            | MessageType::StartRoSpec
            | MessageType::StopRoSpec
            | MessageType::EnableRoSpec
            | MessageType::DisableRoSpec => 4,
            _ => 0,
        }
    }

    /// The response a request of this type is answered with, if any.
    ///
    /// KEEPALIVE_ACK and ENABLE_EVENTS_AND_REPORTS are never answered.
    pub fn response_type(self) -> Option<MessageType> {
        match self {
            MessageType::GetReaderCapabilities => Some(MessageType::GetReaderCapabilitiesResponse),
            MessageType::GetReaderConfig => Some(MessageType::GetReaderConfigResponse),
            MessageType::SetReaderConfig => Some(MessageType::SetReaderConfigResponse),
            MessageType::CloseConnection => Some(MessageType::CloseConnectionResponse),
            MessageType::AddRoSpec => Some(MessageType::AddRoSpecResponse),
            MessageType::DeleteRoSpec => Some(MessageType::DeleteRoSpecResponse),
            MessageType::StartRoSpec => Some(MessageType::StartRoSpecResponse),
            MessageType::StopRoSpec => Some(MessageType::StopRoSpecResponse),
            MessageType::EnableRoSpec => Some(MessageType::EnableRoSpecResponse),
            MessageType::DisableRoSpec => Some(MessageType::DisableRoSpecResponse),
            MessageType::GetRoSpecs => Some(MessageType::GetRoSpecsResponse),
            _ => None,
        }
    }

    /// True for messages the reader sends without being asked.
    pub fn is_unsolicited(self) -> bool {
        matches!(
            self,
            MessageType::KeepAlive
                | MessageType::RoAccessReport
                | MessageType::ReaderEventNotification
        )
    }

    /// True for reader replies to a client request (ERROR_MESSAGE included).
    pub fn is_response(self) -> bool {
        self == MessageType::ErrorMessage
            || Self::ALL
                .iter()
                .any(|request| request.response_type() == Some(self))
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
