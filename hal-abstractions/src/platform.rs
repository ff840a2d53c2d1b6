//! Time, randomness, sleep and sensor primitives
//!
//! Blocking delays reuse `embedded_hal::delay::DelayNs` and randomness reuses
//! `rand_core::RngCore`, so existing HAL drivers slot in without wrappers.

use embedded_hal::delay::DelayNs;
use rand_core::RngCore;

/// Monotonic millisecond clock
///
/// Must never go backwards across calls within one boot. The epoch is
/// arbitrary (typically power-on).
pub trait Monotonic {
    /// Milliseconds since an arbitrary fixed point
    fn now_ms(&mut self) -> u64;
}

/// Analog sensor front-end
pub trait AnalogSensor {
    /// Sample `channel` and return the reading normalized by the board
    /// (volts, percent, ... depending on the wiring)
    fn read_normalized(&mut self, channel: u8) -> f32;
}

/// Low-power sleep control
pub trait LowPower {
    /// Enter deep sleep for `duration_us` microseconds
    ///
    /// On hardware this does not return: the device resets on wake and only
    /// retained memory survives. Host doubles may return, in which case the
    /// caller continues as if it had just woken up.
    fn enter_deep_sleep(&mut self, duration_us: u64);
}

/// Everything the lifecycle core needs from the board
///
/// Implemented automatically for any type providing all the parts.
pub trait Platform: Monotonic + AnalogSensor + LowPower + DelayNs + RngCore {}

impl<T> Platform for T where T: Monotonic + AnalogSensor + LowPower + DelayNs + RngCore {}
