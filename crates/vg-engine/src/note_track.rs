//! Note track engine: step playback onto one gate and one CV channel.

use vg_model::config::STEP_COUNT;
use vg_model::NoteTrackConfig;

use crate::track_engine::LinkData;

/// 1V per octave.
const VOLTS_PER_SEMITONE: f32 = 1.0 / 12.0;

/// Swing delay in ticks for odd steps at a given divisor.
/// 50% is straight; 75% delays odd steps by half a step.
fn swing_offset(divisor: u32, swing: u8) -> u32 {
    divisor * (swing.clamp(50, 75) as u32 - 50) / 50 / 2
}

pub struct NoteTrackEngine {
    mute: bool,
    fill: bool,
    pattern: usize,
    swing: u8,
    relative_tick: u32,
    divisor: u32,
    gate: bool,
    gate_off_tick: Option<u32>,
    cv: f32,
    idle: bool,
    idle_gate: bool,
    idle_cv: f32,
}

impl Default for NoteTrackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteTrackEngine {
    pub fn new() -> Self {
        Self {
            mute: false,
            fill: false,
            pattern: 0,
            swing: 50,
            relative_tick: 0,
            divisor: 1,
            gate: false,
            gate_off_tick: None,
            cv: 0.0,
            idle: false,
            idle_gate: false,
            idle_cv: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.relative_tick = 0;
        self.gate = false;
        self.gate_off_tick = None;
    }

    pub fn tick(&mut self, tick: u32, config: &NoteTrackConfig, link: Option<LinkData>) {
        let sequence = &config.sequences[self.pattern];

        let (relative_tick, divisor) = match link {
            Some(link) => (link.relative_tick, link.divisor),
            None => {
                let divisor = sequence.divisor();
                (tick % sequence.length_ticks(), divisor)
            }
        };
        self.relative_tick = relative_tick;
        self.divisor = divisor;

        if let Some(off) = self.gate_off_tick {
            if tick >= off {
                self.gate = false;
                self.gate_off_tick = None;
            }
        }

        let step = (relative_tick / divisor) as usize;
        if step >= STEP_COUNT {
            return;
        }
        let within_step = relative_tick % divisor;
        let expected = if step % 2 == 1 { swing_offset(divisor, self.swing) } else { 0 };
        if within_step != expected {
            return;
        }

        let step_data = sequence.step(step);
        if step_data.gate() && (self.fill || !self.mute) {
            self.gate = true;
            self.gate_off_tick = Some(tick + step_data.length() as u32);
            self.cv = step_data.note() as f32 * VOLTS_PER_SEMITONE;
        }
    }

    pub fn update(&mut self, _dt: f32, _config: &NoteTrackConfig) {}

    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    pub fn set_fill(&mut self, fill: bool) {
        self.fill = fill;
    }

    pub fn set_pattern(&mut self, pattern: usize) {
        self.pattern = pattern.min(vg_model::config::PATTERN_COUNT - 1);
    }

    pub fn set_swing(&mut self, swing: u8) {
        self.swing = swing;
    }

    pub fn gate_output(&self) -> bool {
        self.gate
    }

    pub fn cv_output(&self) -> f32 {
        self.cv
    }

    /// Arm the step monitor shown while the transport is stopped.
    pub fn monitor_note(&mut self, note: i8) {
        self.idle = true;
        self.idle_gate = false;
        self.idle_cv = note as f32 * VOLTS_PER_SEMITONE;
    }

    pub fn idle_output(&self) -> bool {
        self.idle
    }

    pub fn idle_gate_output(&self) -> bool {
        self.idle_gate
    }

    pub fn idle_cv_output(&self) -> f32 {
        self.idle_cv
    }

    pub fn clear_idle_output(&mut self) {
        self.idle = false;
    }

    pub fn link_data(&self) -> LinkData {
        LinkData { relative_tick: self.relative_tick, divisor: self.divisor }
    }
}
