//! Compile-time configuration constants.

/// Engine resolution in pulses per quarter note.
pub const PPQN: u32 = 192;

/// Number of logical tracks, equal to the number of physical gate and CV channels.
pub const TRACK_COUNT: usize = 8;

/// Patterns per track.
pub const PATTERN_COUNT: usize = 16;

/// Steps per sequence.
pub const STEP_COUNT: usize = 16;

/// ADC input channels.
pub const CV_INPUT_COUNT: usize = 4;

/// Routing table capacity.
pub const ROUTE_COUNT: usize = 8;

/// Maximum voices on a MIDI/CV track.
pub const VOICE_COUNT: usize = 4;

/// Engine ticks per incoming MIDI clock (24 ppq on the wire).
pub const MIDI_DIVISOR: u32 = PPQN / 24;
