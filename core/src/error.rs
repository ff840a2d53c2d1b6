//! Error types for the lifecycle core
//!
//! Bus and retained-memory errors live next to their traits in
//! `hal-abstractions`; everything raised by this crate's own logic is here.

/// Inbound payload could not be turned into a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Payload is not valid UTF-8
    InvalidUtf8,
    /// Unexpected byte at `offset`
    Malformed { offset: usize },
    /// Input ended inside the object after every required field was seen
    UnexpectedEnd,
    /// A required key is absent
    MissingField(&'static str),
    /// A field's value does not fit its bounded destination
    Truncated(&'static str),
    /// A field is present but its value has the wrong type or content
    InvalidValue(&'static str),
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidUtf8 => write!(f, "Payload is not valid UTF-8"),
            Self::Malformed { offset } => write!(f, "Malformed payload at byte {}", offset),
            Self::UnexpectedEnd => write!(f, "Payload ended unexpectedly"),
            Self::MissingField(name) => write!(f, "Missing field '{}'", name),
            Self::Truncated(name) => write!(f, "Field '{}' exceeds its capacity", name),
            Self::InvalidValue(name) => write!(f, "Invalid value for field '{}'", name),
        }
    }
}

impl core::error::Error for DecodeError {}

/// Outbound message could not be encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// Encoded form does not fit the destination buffer
    Overflow,
    /// A numeric field is NaN or infinite
    NonFinite,
}

impl core::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Overflow => write!(f, "Encoded payload exceeds buffer"),
            Self::NonFinite => write!(f, "Non-finite number"),
        }
    }
}

impl core::error::Error for EncodeError {}

/// Retained cycle record failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// Record shorter than the fixed layout
    Length,
    /// Magic marker absent (blank or power-cycled memory)
    BadMagic,
    /// CRC does not match the contents
    Checksum,
    /// Identity length or encoding is invalid
    InvalidIdentity,
}

impl core::fmt::Display for RecordError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Length => write!(f, "Record too short"),
            Self::BadMagic => write!(f, "Record magic missing"),
            Self::Checksum => write!(f, "Record checksum mismatch"),
            Self::InvalidIdentity => write!(f, "Record identity invalid"),
        }
    }
}

impl core::error::Error for RecordError {}

/// Lifecycle configuration rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Device name longer than the bind request allows
    DeviceNameTooLong,
    /// Bus client id is empty
    EmptyClientId,
    /// Poll interval of zero would spin without advancing time
    ZeroPollInterval,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DeviceNameTooLong => write!(f, "Device name too long"),
            Self::EmptyClientId => write!(f, "Client id is empty"),
            Self::ZeroPollInterval => write!(f, "Poll interval must be non-zero"),
        }
    }
}

impl core::error::Error for ConfigError {}
