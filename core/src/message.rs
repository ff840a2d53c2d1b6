//! Messages exchanged with the backend
//!
//! All text fields are fixed-capacity `heapless` strings sized to the backend
//! contract, so a message never allocates and never silently grows.

use heapless::String;

/// Maximum length of a backend-assigned device identity
pub const DEVICE_ID_LEN: usize = 31;

/// Maximum length of a correlation id (hyphenated 128-bit hex)
pub const REQUEST_ID_LEN: usize = 36;

/// Maximum length of the device's self-reported name
pub const DEVICE_NAME_LEN: usize = 31;

/// Inbound and outbound payload buffer size
pub const MAX_PAYLOAD_LEN: usize = 256;

pub type DeviceId = String<DEVICE_ID_LEN>;
pub type RequestId = String<REQUEST_ID_LEN>;
pub type DeviceName = String<DEVICE_NAME_LEN>;
/// Buffer an outbound message is encoded into
pub type Payload = String<MAX_PAYLOAD_LEN>;

/// One sensor sample published under the bound identity
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementReport {
    pub value: f32,
    pub state_of_charge: f32,
    pub device_id: DeviceId,
}

/// Request for a backend-issued identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindRequest {
    pub request_id: RequestId,
    pub device_name: DeviceName,
}

/// Bind outcome reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BindStatus {
    Ok,
    Fail,
}

impl BindStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Fail => "fail",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }
}

/// Backend answer to a [`BindRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindResponse {
    pub request_id: RequestId,
    pub device_id: DeviceId,
    pub status: BindStatus,
}

/// Release of an identity at the end of a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnbindNotice {
    pub device_id: DeviceId,
}

/// Any of the four wire shapes
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    MeasurementReport(MeasurementReport),
    BindRequest(BindRequest),
    BindResponse(BindResponse),
    UnbindNotice(UnbindNotice),
}

impl Message {
    pub fn shape(&self) -> Shape {
        match self {
            Self::MeasurementReport(_) => Shape::MeasurementReport,
            Self::BindRequest(_) => Shape::BindRequest,
            Self::BindResponse(_) => Shape::BindResponse,
            Self::UnbindNotice(_) => Shape::UnbindNotice,
        }
    }
}

/// Message shape expected by a decoder
///
/// Payloads carry no type tag; the topic tells the receiver what to expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Shape {
    MeasurementReport,
    BindRequest,
    BindResponse,
    UnbindNotice,
}

/// Plain-text process command from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Start,
    Stop,
}

impl Command {
    /// Parse a command payload
    ///
    /// Accepts the backend's `iniciar`/`finalizar` as well as `start`/`stop`.
    /// Surrounding ASCII whitespace is ignored; anything else is `None`.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        match payload.trim_ascii() {
            b"iniciar" | b"start" => Some(Self::Start),
            b"finalizar" | b"stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse(b"iniciar"), Some(Command::Start));
        assert_eq!(Command::parse(b"start"), Some(Command::Start));
        assert_eq!(Command::parse(b"finalizar"), Some(Command::Stop));
        assert_eq!(Command::parse(b" stop\r\n"), Some(Command::Stop));
        assert_eq!(Command::parse(b"STOP"), None);
        assert_eq!(Command::parse(b""), None);
        assert_eq!(Command::parse(&[0xff, 0xfe]), None);
    }

    #[test]
    fn test_bind_status_strings() {
        assert_eq!(BindStatus::parse("ok"), Some(BindStatus::Ok));
        assert_eq!(BindStatus::parse("fail"), Some(BindStatus::Fail));
        assert_eq!(BindStatus::parse("OK"), None);
        assert_eq!(BindStatus::Fail.as_str(), "fail");
    }
}
