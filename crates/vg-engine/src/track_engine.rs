//! Polymorphic per-track engine storage and dispatch.
//!
//! One variant is alive per track slot; the enum itself is the
//! in-place storage and a mode change overwrites the slot. Linked
//! timing is passed by value (`LinkData`), resolved by the
//! orchestrator from a track index, so rebuilding a linked engine can
//! never leave a dangling back-reference.

use vg_model::{MidiMessage, MidiPort, TrackConfig, TrackMode};

use crate::curve_track::CurveTrackEngine;
use crate::midi_cv_track::MidiCvTrackEngine;
use crate::note_track::NoteTrackEngine;

/// Timing state a linked track follows instead of its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkData {
    pub relative_tick: u32,
    pub divisor: u32,
}

/// A track engine; exactly one variant per track slot.
pub enum TrackEngine {
    Note(NoteTrackEngine),
    Curve(CurveTrackEngine),
    MidiCv(MidiCvTrackEngine),
}

impl TrackEngine {
    pub fn new(mode: TrackMode) -> Self {
        match mode {
            TrackMode::Note => TrackEngine::Note(NoteTrackEngine::new()),
            TrackMode::Curve => TrackEngine::Curve(CurveTrackEngine::new()),
            TrackMode::MidiCv => TrackEngine::MidiCv(MidiCvTrackEngine::new()),
        }
    }

    pub fn track_mode(&self) -> TrackMode {
        match self {
            TrackEngine::Note(_) => TrackMode::Note,
            TrackEngine::Curve(_) => TrackMode::Curve,
            TrackEngine::MidiCv(_) => TrackMode::MidiCv,
        }
    }

    pub fn reset(&mut self) {
        match self {
            TrackEngine::Note(engine) => engine.reset(),
            TrackEngine::Curve(engine) => engine.reset(),
            TrackEngine::MidiCv(engine) => engine.reset(),
        }
    }

    /// Advance one tick. The config must belong to the same track; a
    /// mode mismatch (transiently possible before reconciliation) is a
    /// no-op.
    pub fn tick(&mut self, tick: u32, config: &TrackConfig, link: Option<LinkData>) {
        match self {
            TrackEngine::Note(engine) => {
                if let Some(note) = config.note() {
                    engine.tick(tick, note, link);
                }
            }
            TrackEngine::Curve(engine) => {
                if let Some(curve) = config.curve() {
                    engine.tick(tick, curve, link);
                }
            }
            TrackEngine::MidiCv(_) => {}
        }
    }

    pub fn update(&mut self, dt: f32, config: &TrackConfig) {
        match self {
            TrackEngine::Note(engine) => {
                if let Some(note) = config.note() {
                    engine.update(dt, note);
                }
            }
            TrackEngine::Curve(engine) => {
                if let Some(curve) = config.curve() {
                    engine.update(dt, curve);
                }
            }
            TrackEngine::MidiCv(engine) => {
                if let Some(midi_cv) = config.midi_cv() {
                    engine.update(dt, midi_cv);
                }
            }
        }
    }

    pub fn receive_midi(
        &mut self,
        port: MidiPort,
        channel: u8,
        message: &MidiMessage,
        config: &TrackConfig,
    ) {
        if let TrackEngine::MidiCv(engine) = self {
            if let Some(midi_cv) = config.midi_cv() {
                engine.receive_midi(port, channel, message, midi_cv);
            }
        }
    }

    pub fn set_mute(&mut self, mute: bool) {
        match self {
            TrackEngine::Note(engine) => engine.set_mute(mute),
            TrackEngine::Curve(engine) => engine.set_mute(mute),
            TrackEngine::MidiCv(engine) => engine.set_mute(mute),
        }
    }

    pub fn set_fill(&mut self, fill: bool) {
        match self {
            TrackEngine::Note(engine) => engine.set_fill(fill),
            TrackEngine::Curve(engine) => engine.set_fill(fill),
            TrackEngine::MidiCv(_) => {}
        }
    }

    pub fn set_pattern(&mut self, pattern: usize) {
        match self {
            TrackEngine::Note(engine) => engine.set_pattern(pattern),
            TrackEngine::Curve(engine) => engine.set_pattern(pattern),
            TrackEngine::MidiCv(_) => {}
        }
    }

    pub fn set_swing(&mut self, swing: u8) {
        match self {
            TrackEngine::Note(engine) => engine.set_swing(swing),
            TrackEngine::Curve(engine) => engine.set_swing(swing),
            TrackEngine::MidiCv(_) => {}
        }
    }

    pub fn gate_output(&self, sub: usize) -> bool {
        match self {
            TrackEngine::Note(engine) => engine.gate_output(),
            TrackEngine::Curve(_) => false,
            TrackEngine::MidiCv(engine) => engine.gate_output(sub),
        }
    }

    pub fn cv_output(&self, sub: usize) -> f32 {
        match self {
            TrackEngine::Note(engine) => engine.cv_output(),
            TrackEngine::Curve(engine) => engine.cv_output(),
            TrackEngine::MidiCv(engine) => engine.cv_output(sub),
        }
    }

    /// Arm the idle preview for a note (Note tracks).
    pub fn monitor_note(&mut self, note: i8) {
        if let TrackEngine::Note(engine) = self {
            engine.monitor_note(note);
        }
    }

    /// Arm the idle preview for a voltage (Curve tracks).
    pub fn monitor_value(&mut self, volts: f32) {
        if let TrackEngine::Curve(engine) = self {
            engine.monitor_value(volts);
        }
    }

    /// Does this engine present an idle (transport stopped) preview?
    pub fn idle_output(&self) -> bool {
        match self {
            TrackEngine::Note(engine) => engine.idle_output(),
            TrackEngine::Curve(engine) => engine.idle_output(),
            TrackEngine::MidiCv(_) => false,
        }
    }

    pub fn idle_gate_output(&self, _sub: usize) -> bool {
        match self {
            TrackEngine::Note(engine) => engine.idle_gate_output(),
            TrackEngine::Curve(_) | TrackEngine::MidiCv(_) => false,
        }
    }

    pub fn idle_cv_output(&self, _sub: usize) -> f32 {
        match self {
            TrackEngine::Note(engine) => engine.idle_cv_output(),
            TrackEngine::Curve(engine) => engine.idle_cv_output(),
            TrackEngine::MidiCv(_) => 0.0,
        }
    }

    pub fn clear_idle_output(&mut self) {
        match self {
            TrackEngine::Note(engine) => engine.clear_idle_output(),
            TrackEngine::Curve(engine) => engine.clear_idle_output(),
            TrackEngine::MidiCv(_) => {}
        }
    }

    /// Timing state for tracks linked to this one; MIDI-driven tracks
    /// have none.
    pub fn link_data(&self) -> Option<LinkData> {
        match self {
            TrackEngine::Note(engine) => Some(engine.link_data()),
            TrackEngine::Curve(engine) => Some(engine.link_data()),
            TrackEngine::MidiCv(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_matches_mode() {
        for mode in [TrackMode::Note, TrackMode::Curve, TrackMode::MidiCv] {
            assert_eq!(TrackEngine::new(mode).track_mode(), mode);
        }
    }

    #[test]
    fn mode_mismatch_is_total() {
        // a Note engine handed a Curve config must not panic or emit
        let mut engine = TrackEngine::new(TrackMode::Note);
        let mut config = TrackConfig::default();
        config.set_mode(TrackMode::Curve);
        engine.tick(0, &config, None);
        assert!(!engine.gate_output(0));
    }

    #[test]
    fn curve_tracks_have_no_gates() {
        let mut engine = TrackEngine::new(TrackMode::Curve);
        let mut config = TrackConfig::default();
        config.set_mode(TrackMode::Curve);
        engine.tick(0, &config, None);
        assert!(!engine.gate_output(0));
        assert!(engine.link_data().is_some());
    }

    #[test]
    fn midi_cv_has_no_link_data() {
        let engine = TrackEngine::new(TrackMode::MidiCv);
        assert!(engine.link_data().is_none());
    }
}
