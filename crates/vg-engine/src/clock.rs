//! Clock source multiplexer and tick dispatcher.
//!
//! Serializes the internal master timer, external gate edges and MIDI
//! realtime bytes into a single monotonic tick stream at PPQN
//! resolution. The orchestrator advances timing with `update(dt_us)`
//! and drains pending ticks with `check_tick` until it returns false.

use arrayvec::ArrayVec;
use vg_model::config::{MIDI_DIVISOR, PPQN};

/// Slave flag: source participates in clocking.
pub const SLAVE_ENABLED: u8 = 1 << 0;
/// Slave flag: a reset edge rewinds the tick counter without stopping,
/// and an edge while idle starts the session.
pub const SLAVE_FREE_RUNNING: u8 = 1 << 1;

/// An external clock origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockSource {
    External = 0,
    Midi = 1,
    UsbMidi = 2,
}

pub(crate) const CLOCK_SOURCE_COUNT: usize = 3;

/// Owner of the current clock session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Session {
    Master,
    Slave(ClockSource),
}

#[derive(Clone, Copy, Debug, Default)]
struct SlaveState {
    divisor: u32,
    enabled: bool,
    free_running: bool,
}

/// Levels driven onto the clock/reset output lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClockOutputState {
    /// Clock pulse line
    pub clock: bool,
    /// Reset pulse line (Reset mode)
    pub reset: bool,
    /// Run level (StartStop mode)
    pub run: bool,
}

/// The clock. Tick values handed out by `check_tick` start at 0 on
/// every start and are strictly consecutive.
pub struct Clock {
    running: bool,
    session: Option<Session>,
    /// Ticks generated since start.
    tick: u32,
    /// Ticks handed out via `check_tick`.
    consumed: u32,
    master_bpm: f32,
    master_phase: f32,
    slaves: [SlaveState; CLOCK_SOURCE_COUNT],
    /// Divisor of the claimed slave source.
    slave_divisor: u32,
    /// Edges accepted since session start.
    slave_edge_count: u32,
    /// Estimated microseconds per engine tick; 0 while unknown.
    slave_period_us: f32,
    slave_phase_us: f32,
    slave_last_edge_us: Option<u64>,
    now_us: u64,
    start_pending: bool,
    stop_pending: bool,
    resume_pending: bool,
    output_divisor: u32,
    output_pulse_us: u32,
    output: ClockOutputState,
    clock_pulse_timer_us: f32,
    reset_pulse_timer_us: f32,
    midi_out: ArrayVec<u8, 32>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            running: false,
            session: None,
            tick: 0,
            consumed: 0,
            master_bpm: 120.0,
            master_phase: 0.0,
            slaves: [SlaveState { divisor: 1, enabled: false, free_running: false };
                CLOCK_SOURCE_COUNT],
            slave_divisor: 1,
            slave_edge_count: 0,
            slave_period_us: 0.0,
            slave_phase_us: 0.0,
            slave_last_edge_us: None,
            now_us: 0,
            start_pending: false,
            stop_pending: false,
            resume_pending: false,
            output_divisor: PPQN / 4,
            output_pulse_us: 1000,
            output: ClockOutputState::default(),
            clock_pulse_timer_us: 0.0,
            reset_pulse_timer_us: 0.0,
            midi_out: ArrayVec::new(),
        }
    }

    /// Advance timing by `dt_us` and generate any due ticks.
    pub fn update(&mut self, dt_us: u32) {
        self.now_us += dt_us as u64;

        // age the output pulses first so a pulse raised by a tick below
        // survives until the next update
        if self.clock_pulse_timer_us > 0.0 {
            self.clock_pulse_timer_us -= dt_us as f32;
            if self.clock_pulse_timer_us <= 0.0 {
                self.clock_pulse_timer_us = 0.0;
                self.output.clock = false;
            }
        }
        if self.reset_pulse_timer_us > 0.0 {
            self.reset_pulse_timer_us -= dt_us as f32;
            if self.reset_pulse_timer_us <= 0.0 {
                self.reset_pulse_timer_us = 0.0;
                self.output.reset = false;
            }
        }

        if self.running {
            match self.session {
                Some(Session::Master) => {
                    self.master_phase +=
                        dt_us as f32 * self.master_bpm * PPQN as f32 / 60_000_000.0;
                    while self.master_phase >= 1.0 {
                        self.master_phase -= 1.0;
                        self.emit_tick();
                    }
                }
                Some(Session::Slave(_)) => {
                    // interpolate toward the next expected edge
                    let limit = self.slave_edge_count * self.slave_divisor;
                    if self.slave_period_us > 0.0 {
                        self.slave_phase_us += dt_us as f32;
                        while self.slave_phase_us >= self.slave_period_us && self.tick < limit {
                            self.slave_phase_us -= self.slave_period_us;
                            self.emit_tick();
                        }
                    }
                }
                None => {}
            }
        }
    }

    /// Generate one tick: queue MIDI clock and raise the clock output.
    fn emit_tick(&mut self) {
        if self.tick % MIDI_DIVISOR == 0 {
            let _ = self.midi_out.try_push(0xf8);
        }
        if self.tick % self.output_divisor == 0 {
            self.output.clock = true;
            self.clock_pulse_timer_us = self.output_pulse_us as f32;
        }
        self.tick += 1;
    }

    fn start_session(&mut self) {
        self.tick = 0;
        self.consumed = 0;
        self.master_phase = 0.0;
        self.slave_edge_count = 0;
        self.slave_phase_us = 0.0;
        self.slave_period_us = 0.0;
        self.slave_last_edge_us = None;
        self.running = true;
        self.start_pending = true;
        self.output.run = true;
        self.output.reset = true;
        self.reset_pulse_timer_us = self.output_pulse_us as f32;
        let _ = self.midi_out.try_push(0xfa);
    }

    fn stop_session(&mut self) {
        if self.running {
            self.stop_pending = true;
            let _ = self.midi_out.try_push(0xfc);
        }
        self.running = false;
        self.output.run = false;
    }

    fn resume_session(&mut self) {
        self.running = true;
        self.resume_pending = true;
        self.output.run = true;
        let _ = self.midi_out.try_push(0xfb);
    }

    // --- master (user intent) ---

    pub fn set_master_bpm(&mut self, bpm: f32) {
        self.master_bpm = bpm;
    }

    pub fn master_start(&mut self) {
        self.session = Some(Session::Master);
        self.start_session();
    }

    pub fn master_stop(&mut self) {
        self.stop_session();
    }

    pub fn master_resume(&mut self) {
        if self.running {
            return;
        }
        if self.session.is_none() {
            self.session = Some(Session::Master);
        }
        self.resume_session();
    }

    // --- slaves ---

    pub fn slave_configure(&mut self, source: ClockSource, divisor: u32, flags: u8) {
        let slave = &mut self.slaves[source as usize];
        slave.divisor = divisor.max(1);
        slave.enabled = flags & SLAVE_ENABLED != 0;
        slave.free_running = flags & SLAVE_FREE_RUNNING != 0;
        // disabling the session owner ends its session
        if !slave.enabled && self.session == Some(Session::Slave(source)) {
            self.stop_session();
            self.session = None;
        }
    }

    /// A source may act when it is enabled and either the clock is idle
    /// or the source already owns the session. The first source to act
    /// after a stop wins.
    fn slave_can_control(&self, source: ClockSource) -> bool {
        self.slaves[source as usize].enabled
            && (!self.running || self.session == Some(Session::Slave(source)))
    }

    /// An edge from an external gate input or a MIDI 0xF8.
    pub fn slave_tick(&mut self, source: ClockSource) {
        if !self.slave_can_control(source) {
            return;
        }
        if !self.running {
            if !self.slaves[source as usize].free_running {
                return;
            }
            self.session = Some(Session::Slave(source));
            self.slave_divisor = self.slaves[source as usize].divisor;
            self.start_session();
        }

        // estimate the per-tick period from the edge interval
        if let Some(last) = self.slave_last_edge_us {
            let interval = (self.now_us - last) as f32;
            if interval > 0.0 {
                self.slave_period_us = interval / self.slave_divisor as f32;
            }
        }
        self.slave_last_edge_us = Some(self.now_us);

        // the edge itself carries a tick; catch up through it
        let edge_tick = self.slave_edge_count * self.slave_divisor;
        while self.tick <= edge_tick {
            self.emit_tick();
        }
        self.slave_edge_count += 1;
        self.slave_phase_us = 0.0;
    }

    pub fn slave_start(&mut self, source: ClockSource) {
        if !self.slave_can_control(source) || self.running {
            return;
        }
        self.session = Some(Session::Slave(source));
        self.slave_divisor = self.slaves[source as usize].divisor;
        self.start_session();
    }

    pub fn slave_stop(&mut self, source: ClockSource) {
        if self.session == Some(Session::Slave(source)) && self.slaves[source as usize].enabled {
            self.stop_session();
        }
    }

    pub fn slave_resume(&mut self, source: ClockSource) {
        if !self.slave_can_control(source) || self.running {
            return;
        }
        self.session = Some(Session::Slave(source));
        self.slave_divisor = self.slaves[source as usize].divisor;
        self.resume_session();
    }

    /// A reset edge. Free-running slaves rewind without stopping; other
    /// slaves rewind and stop.
    pub fn slave_reset(&mut self, source: ClockSource) {
        if !self.slave_can_control(source) {
            return;
        }
        if !self.slaves[source as usize].free_running {
            self.stop_session();
        }
        self.tick = 0;
        self.consumed = 0;
        self.master_phase = 0.0;
        self.slave_edge_count = 0;
        self.slave_phase_us = 0.0;
        self.output.reset = true;
        self.reset_pulse_timer_us = self.output_pulse_us as f32;
    }

    /// One MIDI realtime byte from the privileged receive path.
    pub fn slave_handle_midi(&mut self, source: ClockSource, byte: u8) {
        match byte {
            0xf8 => self.slave_tick(source),
            0xfa => self.slave_start(source),
            0xfb => self.slave_resume(source),
            0xfc => self.slave_stop(source),
            _ => {}
        }
    }

    /// A parsed song-position-pointer (position in MIDI beats). Only
    /// honored while stopped, matching the MIDI transport model.
    pub fn slave_song_position(&mut self, source: ClockSource, position: u16) {
        if !self.slave_can_control(source) || self.running {
            return;
        }
        let tick = position as u32 * (PPQN / 4);
        self.tick = tick;
        self.consumed = tick;
        self.slave_divisor = self.slaves[source as usize].divisor;
        self.slave_edge_count = tick / self.slave_divisor;
        self.slave_phase_us = 0.0;
    }

    // --- consumption by the orchestrator ---

    /// One-shot start edge.
    pub fn check_start(&mut self) -> bool {
        let pending = self.start_pending;
        self.start_pending = false;
        pending
    }

    /// One-shot stop edge.
    pub fn check_stop(&mut self) -> bool {
        let pending = self.stop_pending;
        self.stop_pending = false;
        pending
    }

    /// One-shot resume edge.
    pub fn check_resume(&mut self) -> bool {
        let pending = self.resume_pending;
        self.resume_pending = false;
        pending
    }

    /// Hand out the next pending tick. Callers must drain until false.
    pub fn check_tick(&mut self, tick: &mut u32) -> bool {
        if self.consumed < self.tick {
            *tick = self.consumed;
            self.consumed += 1;
            true
        } else {
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_idle(&self) -> bool {
        !self.running
    }

    // --- outputs ---

    pub fn output_configure(&mut self, divisor: u32, pulse_us: u32) {
        self.output_divisor = divisor.max(1);
        self.output_pulse_us = pulse_us.max(1);
    }

    /// Current clock/reset/run output levels.
    pub fn output_state(&self) -> ClockOutputState {
        self.output
    }

    /// Drain queued outbound MIDI realtime bytes.
    pub fn take_midi_output(&mut self) -> ArrayVec<u8, 32> {
        core::mem::take(&mut self.midi_out)
    }
}
