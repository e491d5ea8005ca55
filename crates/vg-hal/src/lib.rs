//! Hardware abstraction for the voltgrid engine.
//!
//! The `Hal` trait is the only seam between the engine core and the
//! peripherals (DAC, gate drivers, digital IO, MIDI transceivers). On
//! the device it is implemented over the real drivers; this crate ships
//! the simulator backend used by tests and the host binary.

#![cfg_attr(not(feature = "std"), no_std)]

mod traits;

#[cfg(feature = "std")]
mod sim;

pub use traits::{adc_to_volts, DioEvent, Hal};

#[cfg(feature = "std")]
pub use sim::SimHal;
