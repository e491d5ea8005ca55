//! Clock input/output configuration (persisted).

use crate::config::PPQN;

/// Behavior of the reset input/output line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClockMode {
    /// Line carries a reset pulse; the clock free-runs on input edges.
    #[default]
    Reset,
    /// Line carries a start/stop level.
    StartStop,
}

/// Clock source/sink configuration.
///
/// Mutations set a dirty flag; the engine reconfigures the clock on the
/// next update pass and clears it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockSetup {
    clock_input_mode: ClockMode,
    clock_input_divisor: u32,
    clock_output_mode: ClockMode,
    clock_output_divisor: u32,
    clock_output_pulse_ms: u32,
    midi_rx: bool,
    usb_rx: bool,
    midi_tx: bool,
    usb_tx: bool,
    dirty: bool,
}

impl Default for ClockSetup {
    fn default() -> Self {
        Self {
            clock_input_mode: ClockMode::Reset,
            clock_input_divisor: PPQN / 4,
            clock_output_mode: ClockMode::Reset,
            clock_output_divisor: PPQN / 4,
            clock_output_pulse_ms: 1,
            midi_rx: false,
            usb_rx: false,
            midi_tx: false,
            usb_tx: false,
            // starts dirty so the engine configures the clock at init
            dirty: true,
        }
    }
}

impl ClockSetup {
    pub fn clock_input_mode(&self) -> ClockMode {
        self.clock_input_mode
    }

    pub fn set_clock_input_mode(&mut self, mode: ClockMode) {
        self.clock_input_mode = mode;
        self.dirty = true;
    }

    pub fn clock_input_divisor(&self) -> u32 {
        self.clock_input_divisor
    }

    pub fn set_clock_input_divisor(&mut self, divisor: u32) {
        self.clock_input_divisor = divisor.clamp(1, PPQN);
        self.dirty = true;
    }

    pub fn clock_output_mode(&self) -> ClockMode {
        self.clock_output_mode
    }

    pub fn set_clock_output_mode(&mut self, mode: ClockMode) {
        self.clock_output_mode = mode;
        self.dirty = true;
    }

    pub fn clock_output_divisor(&self) -> u32 {
        self.clock_output_divisor
    }

    pub fn set_clock_output_divisor(&mut self, divisor: u32) {
        self.clock_output_divisor = divisor.clamp(1, PPQN);
        self.dirty = true;
    }

    /// Clock output pulse width in milliseconds.
    pub fn clock_output_pulse_ms(&self) -> u32 {
        self.clock_output_pulse_ms
    }

    pub fn set_clock_output_pulse_ms(&mut self, pulse: u32) {
        self.clock_output_pulse_ms = pulse.clamp(1, 20);
        self.dirty = true;
    }

    pub fn midi_rx(&self) -> bool {
        self.midi_rx
    }

    pub fn set_midi_rx(&mut self, enabled: bool) {
        self.midi_rx = enabled;
        self.dirty = true;
    }

    pub fn usb_rx(&self) -> bool {
        self.usb_rx
    }

    pub fn set_usb_rx(&mut self, enabled: bool) {
        self.usb_rx = enabled;
        self.dirty = true;
    }

    pub fn midi_tx(&self) -> bool {
        self.midi_tx
    }

    pub fn set_midi_tx(&mut self, enabled: bool) {
        self.midi_tx = enabled;
        self.dirty = true;
    }

    pub fn usb_tx(&self) -> bool {
        self.usb_tx
    }

    pub fn set_usb_tx(&mut self, enabled: bool) {
        self.usb_tx = enabled;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_mark_dirty() {
        let mut setup = ClockSetup::default();
        setup.clear_dirty();
        setup.set_midi_rx(true);
        assert!(setup.is_dirty());
        assert!(setup.midi_rx());
    }

    #[test]
    fn divisors_clamped_to_at_least_one() {
        let mut setup = ClockSetup::default();
        setup.set_clock_input_divisor(0);
        assert_eq!(setup.clock_input_divisor(), 1);
        setup.set_clock_output_divisor(100_000);
        assert_eq!(setup.clock_output_divisor(), PPQN);
    }
}
