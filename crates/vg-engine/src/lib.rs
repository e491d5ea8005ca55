//! Real-time engine of the voltgrid step sequencer.
//!
//! Consumes the project model, a clock source and external MIDI, and
//! produces per-tick gate/CV outputs plus outbound MIDI. The engine is
//! a single-threaded cooperative loop: `Engine::update()` is driven at
//! a periodic cadence and never blocks; the only cross-thread
//! synchronization is the lock handshake the UI uses to mutate the
//! model.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod clock;
mod curve_track;
mod engine;
mod generator;
mod midi;
mod midi_cv_track;
mod note_track;
mod nudge_tempo;
mod routing_engine;
mod tap_tempo;
mod track_engine;

pub use clock::{Clock, ClockOutputState, ClockSource, SLAVE_ENABLED, SLAVE_FREE_RUNNING};
pub use curve_track::CurveTrackEngine;
pub use engine::{Engine, ErrorFlags};
pub use generator::{
    EuclideanGenerator, Generator, GeneratorContainer, GeneratorMode, GeneratorPattern,
    ParamInfo, QuickRandomGenerator, RandomGenerator, SequenceBuilder,
};
pub use midi::{MidiLearn, MidiLearnResult, MidiParser};
pub use midi_cv_track::MidiCvTrackEngine;
pub use note_track::NoteTrackEngine;
pub use nudge_tempo::NudgeTempo;
pub use tap_tempo::TapTempo;
pub use track_engine::{LinkData, TrackEngine};
