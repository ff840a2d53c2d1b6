//! Cycle state retained across deep sleep
//!
//! Deep sleep wipes RAM but keeps a small retained region. `CycleState` is
//! the only thing the lifecycle keeps there, serialised into a fixed record:
//!
//! ```text
//! offset  size  field
//!      0     4  magic "CYC1"
//!      4     1  flags (bit0 active, bit1 finalized)
//!      5     1  identity length (0 = unbound)
//!      6    31  identity bytes, zero padded
//!     37     4  CRC-32 of bytes 0..37, little endian
//! ```
//!
//! Retained memory comes up as garbage after a power loss, so the magic and
//! checksum decide whether a record is trusted at all.

use crate::error::RecordError;
use crate::message::{DeviceId, DEVICE_ID_LEN};

/// Size of the serialised record in bytes
pub const RECORD_LEN: usize = 4 + 1 + 1 + DEVICE_ID_LEN + 4;

const MAGIC: [u8; 4] = *b"CYC1";
const FLAG_ACTIVE: u8 = 0b01;
const FLAG_FINALIZED: u8 = 0b10;
const FLAGS_OFFSET: usize = 4;
const ID_LEN_OFFSET: usize = 5;
const ID_OFFSET: usize = 6;
const CRC_OFFSET: usize = ID_OFFSET + DEVICE_ID_LEN;

/// Progress of the current cycle
///
/// `finalized` takes precedence over `active`: once a stop is latched the
/// cycle only ever moves towards teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleState {
    /// Identity granted by the backend, present once bound
    pub assigned_id: Option<DeviceId>,
    /// A start command has been accepted
    pub active: bool,
    /// A stop command has been accepted
    pub finalized: bool,
}

impl CycleState {
    /// Whether the device holds a backend identity
    pub fn is_bound(&self) -> bool {
        self.assigned_id.is_some()
    }

    /// Whether nothing is worth retaining
    pub fn is_clear(&self) -> bool {
        *self == Self::default()
    }

    /// Serialise into the fixed retained layout
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut record = [0u8; RECORD_LEN];
        record[..FLAGS_OFFSET].copy_from_slice(&MAGIC);

        let mut flags = 0;
        if self.active {
            flags |= FLAG_ACTIVE;
        }
        if self.finalized {
            flags |= FLAG_FINALIZED;
        }
        record[FLAGS_OFFSET] = flags;

        if let Some(id) = &self.assigned_id {
            // DeviceId capacity equals the slot size, so the length fits a u8
            record[ID_LEN_OFFSET] = id.len() as u8;
            record[ID_OFFSET..ID_OFFSET + id.len()].copy_from_slice(id.as_bytes());
        }

        let crc = crc32fast::hash(&record[..CRC_OFFSET]);
        record[CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
        record
    }

    /// Parse and validate a retained record
    ///
    /// # Errors
    ///
    /// Any failed check yields a `RecordError`; callers treat that as a
    /// fresh boot.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        let record = bytes.get(..RECORD_LEN).ok_or(RecordError::Length)?;

        if record[..FLAGS_OFFSET] != MAGIC {
            return Err(RecordError::BadMagic);
        }

        let mut stored_crc = [0u8; 4];
        stored_crc.copy_from_slice(&record[CRC_OFFSET..]);
        if crc32fast::hash(&record[..CRC_OFFSET]) != u32::from_le_bytes(stored_crc) {
            return Err(RecordError::Checksum);
        }

        let flags = record[FLAGS_OFFSET];
        let id_len = usize::from(record[ID_LEN_OFFSET]);
        if id_len > DEVICE_ID_LEN {
            return Err(RecordError::InvalidIdentity);
        }

        let assigned_id = if id_len == 0 {
            None
        } else {
            let raw = &record[ID_OFFSET..ID_OFFSET + id_len];
            let text = core::str::from_utf8(raw).map_err(|_| RecordError::InvalidIdentity)?;
            Some(DeviceId::try_from(text).map_err(|_| RecordError::InvalidIdentity)?)
        };

        Ok(Self {
            assigned_id,
            active: flags & FLAG_ACTIVE != 0,
            finalized: flags & FLAG_FINALIZED != 0,
        })
    }
}
