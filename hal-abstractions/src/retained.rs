//! Retained memory that survives a sleep-induced reset
//!
//! Contents are undefined after power loss; callers validate what they read.

/// Retained memory errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Request does not fit the retained region
    OutOfRange,
    /// Backing memory could not be accessed
    Hardware,
}

impl core::fmt::Display for StoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "Retained region too small"),
            Self::Hardware => write!(f, "Retained memory access failed"),
        }
    }
}

impl core::error::Error for StoreError {}

/// Opaque byte region preserved across deep sleep
///
/// The store copies bytes in and out and performs no read-modify-write of
/// its own.
pub trait RetainedStore {
    /// Copy the first `buf.len()` bytes of the region into `buf`
    fn read(&mut self, buf: &mut [u8]) -> Result<(), StoreError>;

    /// Overwrite the start of the region with `bytes`
    fn write(&mut self, bytes: &[u8]) -> Result<(), StoreError>;
}
