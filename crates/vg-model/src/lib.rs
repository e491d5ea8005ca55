//! Project data model for the voltgrid step sequencer.
//!
//! This crate defines the contract consumed by the real-time engine:
//! tempo, tracks, sequences, play state, clock setup and routings.
//! The UI mutates it under the engine's lock protocol; the engine reads
//! it every update pass and commits staged play-state requests.
//!
//! Designed to be `no_std` compatible.

#![cfg_attr(not(feature = "std"), no_std)]

mod calibration;
mod clock_setup;
pub mod config;
mod midi;
mod play_state;
mod project;
mod routing;
mod track;

pub use calibration::CvCalibration;
pub use clock_setup::{ClockMode, ClockSetup};
pub use midi::{MidiMessage, MidiPort};
pub use play_state::{ExecuteType, PlayState, TrackState};
pub use project::{ConfigError, Project};
pub use routing::{Route, RouteSource, RouteTarget, Routing};
pub use track::{
    CurveSequence, CurveShape, CurveStep, CurveTrackConfig, MidiCvTrackConfig, MidiSource,
    NoteSequence, NoteStep, NoteTrackConfig, TrackConfig, TrackContent, TrackMode,
};
