//! Inbound message handling
//!
//! Everything the bus delivers lands here, whatever state the controller is
//! in. The handler only mutates cycle and runtime state and marks the cycle
//! dirty; persisting and publishing stay with the controller.

use hal_abstractions::MessageHandler;

use super::{LifecycleStats, RuntimeState, State};
use crate::binding::BindOutcome;
use crate::codec;
use crate::config::topics;
use crate::cycle::CycleState;
use crate::message::Command;

/// Controller state reachable from the bus handler
#[derive(Debug)]
pub(super) struct Session {
    pub(super) runtime: RuntimeState,
    pub(super) cycle: CycleState,
    pub(super) stats: LifecycleStats,
    /// Cycle changed since it was last written to retained memory
    pub(super) dirty: bool,
}

impl MessageHandler for Session {
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        match topic {
            topics::COMMAND => self.on_command(payload),
            topics::BIND_RESPONSE => self.on_bind_response(payload),
            _ => debug!("Ignoring message on {}", topic),
        }
    }
}

impl Session {
    fn on_command(&mut self, payload: &[u8]) {
        match Command::parse(payload) {
            Some(Command::Start) => self.accept_start(),
            Some(Command::Stop) => self.accept_stop(),
            None => {
                self.stats.decode_failures += 1;
                warn!("Dropping unknown command ({} bytes)", payload.len());
            }
        }
    }

    /// A retained or late start must not resurrect a finished cycle
    fn accept_start(&mut self) {
        let state = self.runtime.state;
        if !state.accepts_start() {
            info!("Ignoring start in {}", state);
            return;
        }
        if self.cycle.finalized {
            info!("Ignoring start, cycle already stopped");
            return;
        }

        if !self.cycle.active {
            info!("Start accepted");
            self.cycle.active = true;
            self.dirty = true;
        }

        if state == State::Idle {
            self.runtime.state = if self.cycle.is_bound() {
                State::Measuring
            } else {
                State::Binding
            };
        }
    }

    fn accept_stop(&mut self) {
        let state = self.runtime.state;
        if !state.accepts_stop() {
            info!("Ignoring stop in {}", state);
            return;
        }

        if !self.cycle.finalized {
            info!("Stop accepted, finishing cycle at next decision point");
            self.cycle.finalized = true;
            self.cycle.active = false;
            self.dirty = true;
        }
    }

    fn on_bind_response(&mut self, payload: &[u8]) {
        let response = match codec::decode_bind_response(payload) {
            Ok(response) => response,
            Err(e) => {
                self.stats.decode_failures += 1;
                warn!("Dropping bind response: {}", e);
                return;
            }
        };

        match self.runtime.binding.on_response(&response) {
            BindOutcome::Granted(device_id) => {
                info!("[BIND] Identity assigned: {}", device_id);
                self.cycle.assigned_id = Some(device_id);
                self.dirty = true;
            }
            BindOutcome::Refused => {
                error!("[BIND] Backend refused req_id={}", response.request_id);
            }
            BindOutcome::Unmatched => {
                trace!("Ignoring bind response for req_id={}", response.request_id);
            }
        }
    }
}
