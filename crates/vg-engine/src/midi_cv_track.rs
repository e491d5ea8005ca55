//! MIDI/CV track engine: external MIDI voices onto gate/CV pairs.

use vg_model::config::VOICE_COUNT;
use vg_model::{MidiCvTrackConfig, MidiMessage, MidiPort};

/// 1V per octave, centered on middle C.
const VOLTS_PER_SEMITONE: f32 = 1.0 / 12.0;
const CENTER_NOTE: i32 = 60;
/// Pitch-bend range in semitones at full deflection.
const PITCH_BEND_SEMITONES: f32 = 2.0;
/// All-notes-off controller.
const CC_ALL_NOTES_OFF: u8 = 123;

#[derive(Clone, Copy, Debug, Default)]
struct Voice {
    note: u8,
    gate: bool,
    /// Allocation age for oldest-note stealing.
    order: u32,
}

pub struct MidiCvTrackEngine {
    mute: bool,
    voices: [Voice; VOICE_COUNT],
    /// Voice window from the track config, refreshed each update pass.
    active_voices: usize,
    next_order: u32,
    pitch_bend: f32,
}

impl Default for MidiCvTrackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiCvTrackEngine {
    pub fn new() -> Self {
        Self {
            mute: false,
            voices: [Voice::default(); VOICE_COUNT],
            active_voices: 1,
            next_order: 0,
            pitch_bend: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.voices = [Voice::default(); VOICE_COUNT];
        self.next_order = 0;
        self.pitch_bend = 0.0;
    }

    pub fn update(&mut self, _dt: f32, config: &MidiCvTrackConfig) {
        self.active_voices = config.voices() as usize;
    }

    pub fn receive_midi(
        &mut self,
        port: MidiPort,
        channel: u8,
        message: &MidiMessage,
        config: &MidiCvTrackConfig,
    ) {
        if !config.source().matches(port, channel) {
            return;
        }
        self.active_voices = config.voices() as usize;

        if message.is_note_on() {
            self.note_on(message.note());
        } else if message.is_note_off() {
            self.note_off(message.note());
        } else if message.is_pitch_bend() {
            self.pitch_bend =
                message.pitch_bend_value() as f32 / 8192.0 * PITCH_BEND_SEMITONES;
        } else if message.is_control_change() && message.controller() == CC_ALL_NOTES_OFF {
            for voice in &mut self.voices {
                voice.gate = false;
            }
        }
    }

    fn note_on(&mut self, note: u8) {
        let window = &mut self.voices[..self.active_voices.clamp(1, VOICE_COUNT)];
        // reuse a silent voice, otherwise steal the oldest
        let slot = match window.iter().position(|v| !v.gate) {
            Some(index) => index,
            None => {
                let mut oldest = 0;
                for (index, voice) in window.iter().enumerate() {
                    if voice.order < window[oldest].order {
                        oldest = index;
                    }
                }
                oldest
            }
        };
        window[slot] = Voice { note, gate: true, order: self.next_order };
        self.next_order = self.next_order.wrapping_add(1);
    }

    fn note_off(&mut self, note: u8) {
        for voice in &mut self.voices {
            if voice.gate && voice.note == note {
                voice.gate = false;
            }
        }
    }

    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    /// Number of gate/CV channel pairs this engine drives.
    pub fn channel_count(&self) -> usize {
        self.active_voices.clamp(1, VOICE_COUNT)
    }

    pub fn gate_output(&self, sub: usize) -> bool {
        let voice = &self.voices[sub.min(self.channel_count() - 1)];
        voice.gate && !self.mute
    }

    pub fn cv_output(&self, sub: usize) -> f32 {
        let voice = &self.voices[sub.min(self.channel_count() - 1)];
        (voice.note as i32 - CENTER_NOTE) as f32 * VOLTS_PER_SEMITONE
            + self.pitch_bend * VOLTS_PER_SEMITONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vg_model::MidiSource;

    fn config(voices: u8) -> MidiCvTrackConfig {
        let mut config = MidiCvTrackConfig::default();
        config.set_voices(voices);
        config
    }

    fn note_on(engine: &mut MidiCvTrackEngine, config: &MidiCvTrackConfig, note: u8) {
        let msg = MidiMessage::note_on(0, note, 100);
        engine.receive_midi(MidiPort::Midi, 0, &msg, config);
    }

    fn note_off(engine: &mut MidiCvTrackEngine, config: &MidiCvTrackConfig, note: u8) {
        let msg = MidiMessage::note_off(0, note);
        engine.receive_midi(MidiPort::Midi, 0, &msg, config);
    }

    #[test]
    fn note_on_gates_and_pitches_voice_zero() {
        let config = config(1);
        let mut engine = MidiCvTrackEngine::new();
        note_on(&mut engine, &config, 72);
        assert!(engine.gate_output(0));
        // an octave above middle C is +1V
        assert!((engine.cv_output(0) - 1.0).abs() < 1e-6);

        note_off(&mut engine, &config, 72);
        assert!(!engine.gate_output(0));
    }

    #[test]
    fn polyphonic_allocation_uses_free_voices() {
        let config = config(4);
        let mut engine = MidiCvTrackEngine::new();
        note_on(&mut engine, &config, 60);
        note_on(&mut engine, &config, 64);
        note_on(&mut engine, &config, 67);
        assert!(engine.gate_output(0));
        assert!(engine.gate_output(1));
        assert!(engine.gate_output(2));
        assert!(!engine.gate_output(3));
        assert_eq!(engine.channel_count(), 4);
    }

    #[test]
    fn oldest_voice_is_stolen_when_full() {
        let config = config(2);
        let mut engine = MidiCvTrackEngine::new();
        note_on(&mut engine, &config, 60);
        note_on(&mut engine, &config, 64);
        note_on(&mut engine, &config, 67);
        // voice 0 held the oldest note and is replaced
        assert!((engine.cv_output(0) - 7.0 / 12.0).abs() < 1e-6);
        assert!((engine.cv_output(1) - 4.0 / 12.0).abs() < 1e-6);
    }

    #[test]
    fn source_filter_rejects_other_channels() {
        let mut config = config(1);
        config.set_source(MidiSource { port: None, channel: Some(5) });
        let mut engine = MidiCvTrackEngine::new();
        let msg = MidiMessage::note_on(3, 60, 100);
        engine.receive_midi(MidiPort::Midi, 3, &msg, &config);
        assert!(!engine.gate_output(0));

        let msg = MidiMessage::note_on(5, 60, 100);
        engine.receive_midi(MidiPort::Midi, 5, &msg, &config);
        assert!(engine.gate_output(0));
    }

    #[test]
    fn pitch_bend_shifts_cv() {
        let config = config(1);
        let mut engine = MidiCvTrackEngine::new();
        note_on(&mut engine, &config, 60);
        let bend = MidiMessage::pitch_bend(0, 8191);
        engine.receive_midi(MidiPort::Midi, 0, &bend, &config);
        // full bend is ~2 semitones up
        assert!((engine.cv_output(0) - 2.0 / 12.0).abs() < 0.01);
    }

    #[test]
    fn all_notes_off_clears_gates() {
        let config = config(4);
        let mut engine = MidiCvTrackEngine::new();
        note_on(&mut engine, &config, 60);
        note_on(&mut engine, &config, 64);
        let cc = MidiMessage::control_change(0, CC_ALL_NOTES_OFF, 0);
        engine.receive_midi(MidiPort::Midi, 0, &cc, &config);
        assert!(!engine.gate_output(0));
        assert!(!engine.gate_output(1));
    }

    #[test]
    fn mute_silences_gates_but_keeps_pitch() {
        let config = config(1);
        let mut engine = MidiCvTrackEngine::new();
        note_on(&mut engine, &config, 72);
        engine.set_mute(true);
        assert!(!engine.gate_output(0));
        assert!((engine.cv_output(0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sub_index_clamps_to_voice_window() {
        let config = config(2);
        let mut engine = MidiCvTrackEngine::new();
        note_on(&mut engine, &config, 60);
        note_on(&mut engine, &config, 64);
        // out-of-range sub indices read the last voice
        assert_eq!(engine.gate_output(7), engine.gate_output(1));
        assert_eq!(engine.cv_output(7), engine.cv_output(1));
    }
}
