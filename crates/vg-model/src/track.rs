//! Track configuration: mode, link and per-mode sequence data.

use crate::config::{PATTERN_COUNT, PPQN, STEP_COUNT, TRACK_COUNT, VOICE_COUNT};
use crate::midi::MidiPort;

/// Operating mode of a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackMode {
    Note,
    Curve,
    MidiCv,
}

/// One step of a note sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteStep {
    gate: bool,
    length: u8,
    note: i8,
}

impl Default for NoteStep {
    fn default() -> Self {
        Self { gate: false, length: 24, note: 0 }
    }
}

impl NoteStep {
    pub fn gate(&self) -> bool {
        self.gate
    }

    pub fn set_gate(&mut self, gate: bool) {
        self.gate = gate;
    }

    pub fn toggle_gate(&mut self) {
        self.gate = !self.gate;
    }

    /// Gate length in ticks.
    pub fn length(&self) -> u8 {
        self.length
    }

    pub fn set_length(&mut self, length: u8) {
        self.length = length.max(1);
    }

    /// Note in semitones at 1V/octave; 0 maps to 0V.
    pub fn note(&self) -> i8 {
        self.note
    }

    pub fn set_note(&mut self, note: i8) {
        self.note = note;
    }
}

/// A note pattern: step divisor plus a fixed array of steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteSequence {
    divisor: u32,
    steps: [NoteStep; STEP_COUNT],
}

impl Default for NoteSequence {
    fn default() -> Self {
        Self {
            divisor: PPQN / 4,
            steps: [NoteStep::default(); STEP_COUNT],
        }
    }
}

impl NoteSequence {
    /// Ticks per step.
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    pub fn set_divisor(&mut self, divisor: u32) {
        self.divisor = divisor.clamp(1, PPQN * 4);
    }

    pub fn step(&self, index: usize) -> &NoteStep {
        &self.steps[index.min(STEP_COUNT - 1)]
    }

    pub fn step_mut(&mut self, index: usize) -> &mut NoteStep {
        &mut self.steps[index.min(STEP_COUNT - 1)]
    }

    /// Length of the pattern in ticks.
    pub fn length_ticks(&self) -> u32 {
        STEP_COUNT as u32 * self.divisor
    }
}

/// Segment shape of a curve step, evaluated over the step's phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CurveShape {
    #[default]
    Low,
    High,
    RampUp,
    RampDown,
    Triangle,
    ExpUp,
    ExpDown,
}

/// One step of a curve sequence; min/max span 0..255 mapped to 0..5V.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurveStep {
    shape: CurveShape,
    min: u8,
    max: u8,
}

impl Default for CurveStep {
    fn default() -> Self {
        Self { shape: CurveShape::Low, min: 0, max: 255 }
    }
}

impl CurveStep {
    pub fn shape(&self) -> CurveShape {
        self.shape
    }

    pub fn set_shape(&mut self, shape: CurveShape) {
        self.shape = shape;
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    pub fn set_min(&mut self, min: u8) {
        self.min = min;
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    pub fn set_max(&mut self, max: u8) {
        self.max = max;
    }
}

/// A curve pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurveSequence {
    divisor: u32,
    steps: [CurveStep; STEP_COUNT],
}

impl Default for CurveSequence {
    fn default() -> Self {
        Self {
            divisor: PPQN / 4,
            steps: [CurveStep::default(); STEP_COUNT],
        }
    }
}

impl CurveSequence {
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    pub fn set_divisor(&mut self, divisor: u32) {
        self.divisor = divisor.clamp(1, PPQN * 4);
    }

    pub fn step(&self, index: usize) -> &CurveStep {
        &self.steps[index.min(STEP_COUNT - 1)]
    }

    pub fn step_mut(&mut self, index: usize) -> &mut CurveStep {
        &mut self.steps[index.min(STEP_COUNT - 1)]
    }

    pub fn length_ticks(&self) -> u32 {
        STEP_COUNT as u32 * self.divisor
    }
}

/// Note track data: one sequence per pattern slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteTrackConfig {
    pub sequences: [NoteSequence; PATTERN_COUNT],
}

impl Default for NoteTrackConfig {
    fn default() -> Self {
        Self { sequences: [NoteSequence::default(); PATTERN_COUNT] }
    }
}

/// Curve track data: one sequence per pattern slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurveTrackConfig {
    pub sequences: [CurveSequence; PATTERN_COUNT],
}

impl Default for CurveTrackConfig {
    fn default() -> Self {
        Self { sequences: [CurveSequence::default(); PATTERN_COUNT] }
    }
}

/// MIDI source filter of a MIDI/CV track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MidiSource {
    /// Port filter; `None` accepts both ports.
    pub port: Option<MidiPort>,
    /// Channel filter; `None` is omni.
    pub channel: Option<u8>,
}

impl MidiSource {
    pub fn matches(&self, port: MidiPort, channel: u8) -> bool {
        if let Some(p) = self.port {
            if p != port {
                return false;
            }
        }
        if let Some(c) = self.channel {
            if c != channel {
                return false;
            }
        }
        true
    }
}

/// MIDI/CV track data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiCvTrackConfig {
    source: MidiSource,
    voices: u8,
}

impl Default for MidiCvTrackConfig {
    fn default() -> Self {
        Self { source: MidiSource::default(), voices: 1 }
    }
}

impl MidiCvTrackConfig {
    pub fn source(&self) -> &MidiSource {
        &self.source
    }

    pub fn set_source(&mut self, source: MidiSource) {
        self.source = source;
    }

    pub fn voices(&self) -> u8 {
        self.voices
    }

    pub fn set_voices(&mut self, voices: u8) {
        self.voices = voices.clamp(1, VOICE_COUNT as u8);
    }
}

/// Mode-dependent track data. The variant is the storage; changing mode
/// replaces it with the new mode's default.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TrackContent {
    Note(NoteTrackConfig),
    Curve(CurveTrackConfig),
    MidiCv(MidiCvTrackConfig),
}

/// Configuration of one track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackConfig {
    content: TrackContent,
    link_track: i8,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            content: TrackContent::Note(NoteTrackConfig::default()),
            link_track: -1,
        }
    }
}

impl TrackConfig {
    pub fn mode(&self) -> TrackMode {
        match self.content {
            TrackContent::Note(_) => TrackMode::Note,
            TrackContent::Curve(_) => TrackMode::Curve,
            TrackContent::MidiCv(_) => TrackMode::MidiCv,
        }
    }

    /// Switch modes, discarding the previous mode's data.
    pub fn set_mode(&mut self, mode: TrackMode) {
        if self.mode() == mode {
            return;
        }
        self.content = match mode {
            TrackMode::Note => TrackContent::Note(NoteTrackConfig::default()),
            TrackMode::Curve => TrackContent::Curve(CurveTrackConfig::default()),
            TrackMode::MidiCv => TrackContent::MidiCv(MidiCvTrackConfig::default()),
        };
    }

    /// Index of the track whose timing this one follows; -1 for none.
    pub fn link_track(&self) -> i8 {
        self.link_track
    }

    pub fn set_link_track(&mut self, link_track: i8) {
        self.link_track = link_track.clamp(-1, TRACK_COUNT as i8 - 1);
    }

    pub fn note(&self) -> Option<&NoteTrackConfig> {
        match &self.content {
            TrackContent::Note(config) => Some(config),
            _ => None,
        }
    }

    pub fn note_mut(&mut self) -> Option<&mut NoteTrackConfig> {
        match &mut self.content {
            TrackContent::Note(config) => Some(config),
            _ => None,
        }
    }

    pub fn curve(&self) -> Option<&CurveTrackConfig> {
        match &self.content {
            TrackContent::Curve(config) => Some(config),
            _ => None,
        }
    }

    pub fn curve_mut(&mut self) -> Option<&mut CurveTrackConfig> {
        match &mut self.content {
            TrackContent::Curve(config) => Some(config),
            _ => None,
        }
    }

    pub fn midi_cv(&self) -> Option<&MidiCvTrackConfig> {
        match &self.content {
            TrackContent::MidiCv(config) => Some(config),
            _ => None,
        }
    }

    pub fn midi_cv_mut(&mut self) -> Option<&mut MidiCvTrackConfig> {
        match &mut self.content {
            TrackContent::MidiCv(config) => Some(config),
            _ => None,
        }
    }
}
