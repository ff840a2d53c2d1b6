//! Identity binding protocol
//!
//! The node asks the backend for an identity by publishing a [`BindRequest`]
//! tagged with a fresh correlation id, then matches [`BindResponse`]s against
//! that id. At most one request is outstanding; starting a new attempt
//! abandons the previous id, so a late answer to an abandoned request can
//! never be mistaken for the current one.
//!
//! Correlation ids are random 128-bit values rendered as hyphenated hex
//! (UUID v4 layout). They only need to avoid collisions between devices on a
//! shared bus; they are not secrets.

use rand_core::RngCore;
use uuid::Builder;

use crate::message::{BindRequest, BindResponse, BindStatus, DeviceId, DeviceName, RequestId};

/// Result of offering a response to the binding session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// Response matched and granted this identity
    Granted(DeviceId),
    /// Response matched but the backend refused (or granted nothing)
    Refused,
    /// Correlation id does not belong to the outstanding request
    Unmatched,
}

/// Volatile binding progress, rebuilt on every boot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindSession {
    pending: Option<RequestId>,
    acknowledged: bool,
}

impl BindSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for a device that already holds an identity from a previous
    /// boot; no request is pending and none is needed
    pub fn restored(bound: bool) -> Self {
        Self {
            pending: None,
            acknowledged: bound,
        }
    }

    /// Start a new bind attempt
    ///
    /// Generates a fresh correlation id, replaces any outstanding one and
    /// returns the request to publish.
    pub fn begin<R: RngCore + ?Sized>(&mut self, rng: &mut R, device_name: &DeviceName) -> BindRequest {
        let request_id = correlation_id(rng);
        self.pending = Some(request_id.clone());
        self.acknowledged = false;
        BindRequest {
            request_id,
            device_name: device_name.clone(),
        }
    }

    /// Offer an inbound response
    ///
    /// Only an exact correlation id match against the outstanding request
    /// changes anything. A granted identity clears the pending id so
    /// duplicates are ignored afterwards.
    pub fn on_response(&mut self, response: &BindResponse) -> BindOutcome {
        if self.pending.as_ref() != Some(&response.request_id) {
            return BindOutcome::Unmatched;
        }

        match response.status {
            BindStatus::Ok if !response.device_id.is_empty() => {
                self.pending = None;
                self.acknowledged = true;
                BindOutcome::Granted(response.device_id.clone())
            }
            // Request stays outstanding until the attempt times out
            BindStatus::Ok | BindStatus::Fail => BindOutcome::Refused,
        }
    }

    /// Correlation id of the outstanding request, if any
    pub fn pending_request_id(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// Give up on the outstanding request
    ///
    /// A late answer to it is `Unmatched` from now on.
    pub fn abandon(&mut self) {
        self.pending = None;
    }

    /// Forget everything (end of cycle)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Generate a hyphenated 128-bit correlation id
pub fn correlation_id<R: RngCore + ?Sized>(rng: &mut R) -> RequestId {
    let mut random = [0u8; 16];
    rng.fill_bytes(&mut random);
    let uuid = Builder::from_random_bytes(random).into_uuid();

    let mut buf = uuid::Uuid::encode_buffer();
    let rendered = uuid.hyphenated().encode_lower(&mut buf);

    // A hyphenated UUID is exactly REQUEST_ID_LEN characters
    RequestId::try_from(&*rendered).unwrap_or_default()
}
