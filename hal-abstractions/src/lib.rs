//! Hardware abstraction traits for the sensor node firmware
//!
//! This crate defines the narrow contracts the lifecycle core consumes.
//! Board support packages implement these traits; the core never touches
//! a peripheral directly.
//!
//! - **`platform`**: time, randomness, blocking delay, sensor sampling and
//!   deep sleep, combined into [`Platform`]
//! - **`bus`**: publish/subscribe message bus with explicit handler dispatch
//! - **`retained`**: byte region that survives a sleep-induced reset

#![no_std]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod bus;
pub mod platform;
pub mod retained;

pub use bus::{BusError, MessageBus, MessageHandler};
pub use platform::{AnalogSensor, LowPower, Monotonic, Platform};
pub use retained::{RetainedStore, StoreError};
