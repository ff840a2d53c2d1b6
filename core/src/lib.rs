//! Platform-agnostic lifecycle logic for the sensor node firmware
//!
//! This crate contains the control loop that binds the node to a
//! backend-issued identity, reports measurements under it and sleeps between
//! cycles. It has NO hardware dependencies: boards plug in through the traits
//! of `hal-abstractions`.
//!
//! - **`codec`**: flat text encoding of the four backend message shapes
//! - **`cycle`**: the record that survives a sleep-induced reset
//! - **`binding`**: correlation ids and bind response matching
//! - **`lifecycle`**: the state machine driving everything above
//! - **`config`**: timing constants, device naming and topic names
//!
//! ## Features
//!
//! - **`defmt`** (default): route log statements to `defmt` (otherwise they compile out)

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![cfg_attr(not(test), deny(warnings))]

#[macro_use]
mod fmt;

pub mod binding;
pub mod codec;
pub mod config;
pub mod cycle;
pub mod error;
pub mod lifecycle;
pub mod message;

#[cfg(test)]
mod sim;

pub use binding::{BindOutcome, BindSession};
pub use config::{topics, LifecycleConfig};
pub use cycle::CycleState;
pub use error::{ConfigError, DecodeError, EncodeError, RecordError};
pub use lifecycle::{Lifecycle, LifecycleStats, RuntimeState, State};
pub use message::{
    BindRequest, BindResponse, BindStatus, Command, MeasurementReport, Message, Shape,
    UnbindNotice,
};
