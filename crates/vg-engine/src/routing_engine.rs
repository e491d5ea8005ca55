//! Routing engine: maps CV inputs and MIDI control changes onto
//! project parameters.

use arrayvec::ArrayVec;
use vg_model::config::{CV_INPUT_COUNT, ROUTE_COUNT};
use vg_model::{ExecuteType, MidiMessage, MidiPort, Project, Route, RouteSource, RouteTarget};

/// Normalized-value change below this is ignored (ADC noise floor).
const CHANGE_EPSILON: f32 = 1.0 / 1024.0;

pub struct RoutingEngine {
    /// Last applied normalized value per route slot; NaN = never applied.
    last_values: [f32; ROUTE_COUNT],
}

impl Default for RoutingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingEngine {
    pub fn new() -> Self {
        Self { last_values: [f32::NAN; ROUTE_COUNT] }
    }

    /// Evaluate CV-input routes against the current ADC values.
    pub fn update(&mut self, project: &mut Project, cv_inputs: &[f32; CV_INPUT_COUNT]) {
        let routes: ArrayVec<Route, ROUTE_COUNT> =
            project.routing().routes().iter().copied().collect();

        for (index, route) in routes.iter().enumerate() {
            let RouteSource::CvIn { channel } = route.source else {
                continue;
            };
            let volts = cv_inputs[(channel as usize).min(CV_INPUT_COUNT - 1)];
            let normalized = ((volts + 5.0) / 10.0).clamp(0.0, 1.0);
            self.apply(project, index, route, normalized);
        }
    }

    /// Offer a received MIDI message to the CC routes.
    pub fn receive_midi(&mut self, project: &mut Project, port: MidiPort, message: &MidiMessage) {
        if !message.is_control_change() {
            return;
        }
        let routes: ArrayVec<Route, ROUTE_COUNT> =
            project.routing().routes().iter().copied().collect();

        for (index, route) in routes.iter().enumerate() {
            let RouteSource::CcMidi { port: route_port, channel, controller } = route.source
            else {
                continue;
            };
            if let Some(p) = route_port {
                if p != port {
                    continue;
                }
            }
            if channel != message.channel() || controller != message.controller() {
                continue;
            }
            let normalized = message.controller_value() as f32 / 127.0;
            self.apply(project, index, route, normalized);
        }
    }

    fn apply(&mut self, project: &mut Project, index: usize, route: &Route, normalized: f32) {
        let last = self.last_values[index];
        let delta = normalized - last;
        if last.is_finite() && delta < CHANGE_EPSILON && delta > -CHANGE_EPSILON {
            return;
        }
        self.last_values[index] = normalized;

        let value = route.min + (route.max - route.min) * normalized;
        match route.target {
            RouteTarget::Bpm => project.set_bpm(value),
            RouteTarget::Swing => project.set_swing(value as u8),
            RouteTarget::SyncMeasure => project.set_sync_measure(value as u32),
            RouteTarget::Mute { track } => {
                project
                    .play_state_mut()
                    .request_mute(track as usize, value >= 0.5, ExecuteType::Immediate);
            }
            RouteTarget::Fill { track } => {
                project.play_state_mut().set_fill(track as usize, value >= 0.5);
            }
            RouteTarget::Pattern { track } => {
                project
                    .play_state_mut()
                    .request_pattern(track as usize, value as u8, ExecuteType::Immediate);
            }
        }
    }
}
