//! Curve track engine: stepped CV shapes, no gates.

use vg_model::config::{PATTERN_COUNT, STEP_COUNT};
use vg_model::{CurveShape, CurveTrackConfig};

use crate::track_engine::LinkData;

/// Full-scale curve range in volts.
const RANGE_VOLTS: f32 = 5.0;

/// Evaluate a shape over the step phase in [0, 1).
fn shape_value(shape: CurveShape, phase: f32) -> f32 {
    match shape {
        CurveShape::Low => 0.0,
        CurveShape::High => 1.0,
        CurveShape::RampUp => phase,
        CurveShape::RampDown => 1.0 - phase,
        CurveShape::Triangle => {
            if phase < 0.5 {
                2.0 * phase
            } else {
                2.0 - 2.0 * phase
            }
        }
        CurveShape::ExpUp => phase * phase,
        CurveShape::ExpDown => (1.0 - phase) * (1.0 - phase),
    }
}

pub struct CurveTrackEngine {
    mute: bool,
    fill: bool,
    pattern: usize,
    relative_tick: u32,
    divisor: u32,
    cv: f32,
    idle: bool,
    idle_cv: f32,
}

impl Default for CurveTrackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CurveTrackEngine {
    pub fn new() -> Self {
        Self {
            mute: false,
            fill: false,
            pattern: 0,
            relative_tick: 0,
            divisor: 1,
            cv: 0.0,
            idle: false,
            idle_cv: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.relative_tick = 0;
        self.cv = 0.0;
    }

    pub fn tick(&mut self, tick: u32, config: &CurveTrackConfig, link: Option<LinkData>) {
        let sequence = &config.sequences[self.pattern];

        let (relative_tick, divisor) = match link {
            Some(link) => (link.relative_tick, link.divisor),
            None => (tick % sequence.length_ticks(), sequence.divisor()),
        };
        self.relative_tick = relative_tick;
        self.divisor = divisor;

        // muted curves hold their last value; fill resumes tracking
        if self.mute && !self.fill {
            return;
        }

        let step = ((relative_tick / divisor) as usize).min(STEP_COUNT - 1);
        let phase = (relative_tick % divisor) as f32 / divisor as f32;
        let step_data = sequence.step(step);
        let min = step_data.min() as f32 / 255.0;
        let max = step_data.max() as f32 / 255.0;
        let value = min + (max - min) * shape_value(step_data.shape(), phase);
        self.cv = value * RANGE_VOLTS;
    }

    pub fn update(&mut self, _dt: f32, _config: &CurveTrackConfig) {}

    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    pub fn set_fill(&mut self, fill: bool) {
        self.fill = fill;
    }

    pub fn set_pattern(&mut self, pattern: usize) {
        self.pattern = pattern.min(PATTERN_COUNT - 1);
    }

    /// Curves do not swing; present for the shared engine surface.
    pub fn set_swing(&mut self, _swing: u8) {}

    pub fn cv_output(&self) -> f32 {
        self.cv
    }

    /// Arm the value monitor shown while the transport is stopped.
    pub fn monitor_value(&mut self, volts: f32) {
        self.idle = true;
        self.idle_cv = volts;
    }

    pub fn idle_output(&self) -> bool {
        self.idle
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
