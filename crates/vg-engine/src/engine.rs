//! Engine orchestrator: update loop, lock protocol, output routing.

use alloc::boxed::Box;

use vg_hal::{DioEvent, Hal};
use vg_model::config::{CV_INPUT_COUNT, MIDI_DIVISOR, PPQN, TRACK_COUNT};
use vg_model::{ClockMode, MidiMessage, MidiPort, Project, TrackState};

use crate::clock::{Clock, ClockSource, SLAVE_ENABLED, SLAVE_FREE_RUNNING};
use crate::generator::GeneratorContainer;
use crate::midi::{MidiLearn, MidiParser};
use crate::nudge_tempo::NudgeTempo;
use crate::routing_engine::RoutingEngine;
use crate::tap_tempo::TapTempo;
use crate::track_engine::TrackEngine;

/// Sticky error flags surfaced to the UI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorFlags {
    /// The MIDI receive ring overflowed and dropped bytes.
    pub midi_overflow: bool,
    /// A peripheral reported a bus failure; outputs hold last-good values.
    pub peripheral: bool,
}

type MessageHandler = Box<dyn FnMut(&str, u32) + Send>;
type MidiReceiveHandler = Box<dyn FnMut(MidiPort, &MidiMessage) + Send>;

const MESSAGE_DURATION_MS: u32 = 1000;

/// The real-time engine. `update()` is driven at a periodic cadence
/// (~1 kHz on the device); everything it needs is pre-allocated here.
pub struct Engine<H: Hal> {
    hal: H,
    project: Project,
    clock: Clock,
    track_engines: [TrackEngine; TRACK_COUNT],
    routing_engine: RoutingEngine,
    generators: GeneratorContainer,
    midi_parsers: [MidiParser; 2],
    midi_learn: MidiLearn,
    tap_tempo: TapTempo,
    nudge_tempo: NudgeTempo,
    tick: u32,
    running: bool,
    request_lock: bool,
    request_unlock: bool,
    locked: bool,
    gate_output_override: bool,
    gate_override_mask: u8,
    cv_output_override: bool,
    cv_override_values: [f32; TRACK_COUNT],
    cv_input_values: [f32; CV_INPUT_COUNT],
    message_handler: Option<MessageHandler>,
    midi_receive_handler: Option<MidiReceiveHandler>,
    error_flags: ErrorFlags,
    last_now_us: u64,
}

impl<H: Hal> Engine<H> {
    pub fn new(hal: H, project: Project) -> Self {
        let track_engines =
            core::array::from_fn(|i| TrackEngine::new(project.track(i).mode()));
        Self {
            hal,
            project,
            clock: Clock::new(),
            track_engines,
            routing_engine: RoutingEngine::new(),
            generators: GeneratorContainer::new(),
            midi_parsers: [MidiParser::new(), MidiParser::new()],
            midi_learn: MidiLearn::new(),
            tap_tempo: TapTempo::new(),
            nudge_tempo: NudgeTempo::new(),
            tick: 0,
            running: false,
            request_lock: false,
            request_unlock: false,
            locked: false,
            gate_output_override: false,
            gate_override_mask: 0,
            cv_output_override: false,
            cv_override_values: [0.0; TRACK_COUNT],
            cv_input_values: [0.0; CV_INPUT_COUNT],
            message_handler: None,
            midi_receive_handler: None,
            error_flags: ErrorFlags::default(),
            last_now_us: 0,
        }
    }

    /// Validate the project, push initial state into the track engines
    /// and arm the timing reference. Must run once before `update`.
    pub fn init(&mut self) {
        while let Err(error) = self.project.validate() {
            let text = error.message();
            self.project.revert(&error);
            self.show_message(text, MESSAGE_DURATION_MS);
        }

        for i in 0..TRACK_COUNT {
            let state = *self.project.play_state().track_state(i);
            let engine = &mut self.track_engines[i];
            engine.set_mute(state.mute());
            engine.set_fill(state.fill());
            engine.set_pattern(state.pattern() as usize);
            engine.set_swing(self.project.swing());
        }
        self.reset_track_engines();

        self.last_now_us = self.hal.now_us();
    }

    /// One pass of the cooperative loop.
    pub fn update(&mut self) {
        let now_us = self.hal.now_us();
        let dt_us = (now_us - self.last_now_us) as u32;
        let dt = dt_us as f32 / 1_000_000.0;
        self.last_now_us = now_us;

        // lock handshake
        if self.request_lock {
            self.clock.master_stop();
            self.request_lock = false;
            self.locked = true;
        }
        if self.request_unlock {
            self.request_unlock = false;
            self.locked = false;
        }

        if self.locked {
            // discard clock ticks and all MIDI so the model is quiescent
            let mut tick = 0;
            while self.clock.check_tick(&mut tick) {}
            for port in [MidiPort::Midi, MidiPort::UsbMidi] {
                while self.hal.midi_poll_realtime(port).is_some() {}
                while self.hal.midi_poll(port).is_some() {}
            }
            while self.hal.next_dio_event().is_some() {}
            self.update_overrides();
            self.hal.flush_cv();
            return;
        }

        // clock timing, then the inputs that feed it
        self.clock.update(dt_us);
        self.process_dio_events();

        // transport edges
        if self.clock.check_start() {
            self.reset_track_engines();
            self.running = true;
        }
        if self.clock.check_stop() {
            self.running = false;
        }
        if self.clock.check_resume() {
            self.running = true;
        }

        self.receive_midi();

        // tempo
        self.nudge_tempo.update(dt);
        self.clock
            .set_master_bpm(self.project.bpm() + self.nudge_tempo.strength() * 10.0);

        self.update_clock_setup();
        self.update_track_setups();
        self.update_play_state();
        self.update_cv_inputs();
        self.routing_engine.update(&mut self.project, &self.cv_input_values);

        // drain all pending ticks; outputs are routed per tick
        let mut tick = 0;
        let mut update_outputs = true;
        while self.clock.check_tick(&mut tick) {
            self.tick = tick;
            self.update_play_state();
            self.tick_track_engines();
            self.update_track_outputs();
            update_outputs = false;
        }
        if update_outputs {
            self.update_track_outputs();
        }

        for i in 0..TRACK_COUNT {
            self.track_engines[i].update(dt, self.project.track(i));
        }

        self.send_clock_output();
        self.update_overrides();
        self.hal.flush_cv();

        if self.hal.take_midi_overflow() {
            self.error_flags.midi_overflow = true;
            self.show_message("MIDI OVERFLOW", MESSAGE_DURATION_MS);
        }
        if self.hal.take_peripheral_error() {
            self.error_flags.peripheral = true;
            self.show_message("PERIPHERAL ERROR", MESSAGE_DURATION_MS);
        }
    }

    // --- lock protocol ---

    /// Stop the clock and park the engine so the model can be mutated.
    /// Spins over `update()` until the handshake completes.
    pub fn lock(&mut self) {
        while !self.is_locked() {
            self.request_lock = true;
            self.update();
        }
    }

    pub fn unlock(&mut self) {
        while self.is_locked() {
            self.request_unlock = true;
            self.update();
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    // --- transport ---

    pub fn start(&mut self) {
        self.clock.master_start();
    }

    pub fn stop(&mut self) {
        self.clock.master_stop();
    }

    pub fn resume(&mut self) {
        self.clock.master_resume();
    }

    // --- tempo ---

    pub fn tap_tempo_reset(&mut self) {
        self.tap_tempo.reset(self.project.bpm());
    }

    pub fn tap_tempo_tap(&mut self) {
        self.tap_tempo.tap(self.hal.now_us());
        let bpm = self.tap_tempo.bpm();
        self.project.set_bpm(bpm);
    }

    pub fn nudge_tempo_set_direction(&mut self, direction: i32) {
        self.nudge_tempo.set_direction(direction);
    }

    pub fn nudge_tempo_strength(&self) -> f32 {
        self.nudge_tempo.strength()
    }

    /// Position within the sync measure, in [0, 1).
    pub fn sync_measure_fraction(&self) -> f32 {
        let measure_divisor = self.project.sync_measure() * PPQN * 4;
        (self.tick % measure_divisor) as f32 / measure_divisor as f32
    }

    // --- MIDI / messages ---

    pub fn send_midi(&mut self, port: MidiPort, message: &MidiMessage) {
        self.hal.midi_send(port, message);
    }

    pub fn show_message(&mut self, text: &str, duration_ms: u32) {
        if let Some(handler) = &mut self.message_handler {
            handler(text, duration_ms);
        }
    }

    pub fn set_message_handler(&mut self, handler: MessageHandler) {
        self.message_handler = Some(handler);
    }

    pub fn set_midi_receive_handler(&mut self, handler: MidiReceiveHandler) {
        self.midi_receive_handler = Some(handler);
    }

    pub fn midi_learn(&mut self) -> &mut MidiLearn {
        &mut self.midi_learn
    }

    // --- overrides ---

    pub fn set_gate_output_override(&mut self, enabled: bool) {
        self.gate_output_override = enabled;
    }

    pub fn set_gate_output_override_value(&mut self, mask: u8) {
        self.gate_override_mask = mask;
    }

    pub fn set_cv_output_override(&mut self, enabled: bool) {
        self.cv_output_override = enabled;
    }

    pub fn set_cv_output_override_value(&mut self, channel: usize, volts: f32) {
        if channel < TRACK_COUNT {
            self.cv_override_values[channel] = volts;
        }
    }

    // --- accessors ---

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Mutable model access; outside play-state requests this is only
    /// legal while the engine is locked.
    pub fn project_mut(&mut self) -> &mut Project {
        &mut self.project
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn track_engine(&self, index: usize) -> &TrackEngine {
        &self.track_engines[index.min(TRACK_COUNT - 1)]
    }

    pub fn track_engine_mut(&mut self, index: usize) -> &mut TrackEngine {
        &mut self.track_engines[index.min(TRACK_COUNT - 1)]
    }

    pub fn generators(&mut self) -> &mut GeneratorContainer {
        &mut self.generators
    }

    pub fn error_flags(&self) -> ErrorFlags {
        self.error_flags
    }

    pub fn clear_error_flags(&mut self) {
        self.error_flags = ErrorFlags::default();
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    // --- internals ---

    fn reset_track_engines(&mut self) {
        for engine in &mut self.track_engines {
            engine.reset();
        }
    }

    /// Translate gate input transitions per the configured input mode.
    fn process_dio_events(&mut self) {
        while let Some(event) = self.hal.next_dio_event() {
            match event {
                DioEvent::ClockEdge(value) => {
                    if value {
                        self.clock.slave_tick(ClockSource::External);
                    }
                }
                DioEvent::ResetEdge(value) => {
                    match self.project.clock_setup().clock_input_mode() {
                        ClockMode::Reset => {
                            if value {
                                self.clock.slave_reset(ClockSource::External);
                            }
                        }
                        ClockMode::StartStop => {
                            if value {
                                self.clock.slave_start(ClockSource::External);
                            } else {
                                self.clock.slave_stop(ClockSource::External);
                            }
                        }
                    }
                }
            }
        }
    }

    fn clock_source_for(port: MidiPort) -> ClockSource {
        match port {
            MidiPort::Midi => ClockSource::Midi,
            MidiPort::UsbMidi => ClockSource::UsbMidi,
        }
    }

    fn receive_midi(&mut self) {
        for port in [MidiPort::Midi, MidiPort::UsbMidi] {
            let source = Self::clock_source_for(port);
            while let Some(byte) = self.hal.midi_poll_realtime(port) {
                self.clock.slave_handle_midi(source, byte);
            }
            while let Some(byte) = self.hal.midi_poll(port) {
                if let Some(message) = self.midi_parsers[port as usize].feed(byte) {
                    self.dispatch_midi(port, &message);
                }
            }
        }
    }

    /// Learn first, then routing, then the user handler, then tracks.
    fn dispatch_midi(&mut self, port: MidiPort, message: &MidiMessage) {
        self.midi_learn.receive_midi(port, message);
        self.routing_engine.receive_midi(&mut self.project, port, message);
        if let Some(handler) = &mut self.midi_receive_handler {
            handler(port, message);
        }
        if message.is_song_position() {
            self.clock
                .slave_song_position(Self::clock_source_for(port), message.song_position_value());
        }
        let channel = message.channel();
        for i in 0..TRACK_COUNT {
            self.track_engines[i].receive_midi(port, channel, message, self.project.track(i));
        }
    }

    fn update_clock_setup(&mut self) {
        if !self.project.clock_setup().is_dirty() {
            return;
        }
        let setup = *self.project.clock_setup();

        self.clock.slave_configure(
            ClockSource::External,
            setup.clock_input_divisor(),
            SLAVE_ENABLED
                | if setup.clock_input_mode() == ClockMode::Reset {
                    SLAVE_FREE_RUNNING
                } else {
                    0
                },
        );
        self.clock.slave_configure(
            ClockSource::Midi,
            MIDI_DIVISOR,
            if setup.midi_rx() { SLAVE_ENABLED } else { 0 },
        );
        self.clock.slave_configure(
            ClockSource::UsbMidi,
            MIDI_DIVISOR,
            if setup.usb_rx() { SLAVE_ENABLED } else { 0 },
        );

        self.clock.output_configure(
            setup.clock_output_divisor(),
            setup.clock_output_pulse_ms() * 1000,
        );

        self.hal.set_clock_output(false);
        self.hal.set_reset_output(match setup.clock_output_mode() {
            ClockMode::StartStop => self.clock.is_running(),
            ClockMode::Reset => false,
        });

        self.project.clock_setup_mut().clear_dirty();
    }

    /// Rebuild engines whose mode changed and keep swing current.
    fn update_track_setups(&mut self) {
        for i in 0..TRACK_COUNT {
            let mode = self.project.track(i).mode();
            if self.track_engines[i].track_mode() != mode {
                let state = *self.project.play_state().track_state(i);
                let engine = &mut self.track_engines[i];
                *engine = TrackEngine::new(mode);
                engine.set_mute(state.mute());
                engine.set_fill(state.fill());
                engine.set_pattern(state.pattern() as usize);
            }
            self.track_engines[i].set_swing(self.project.swing());
        }
    }

    /// Evaluate the staged play-state requests against this tick.
    fn update_play_state(&mut self) {
        let play_state = self.project.play_state_mut();
        let has_immediate = play_state.has_immediate_requests();
        let has_synced = play_state.has_synced_requests();
        let handle_latched = play_state.execute_latched_requests();

        if !(has_immediate || has_synced || handle_latched) {
            return;
        }

        let measure_divisor = self.project.sync_measure() * PPQN * 4;
        let handle_synced = self.tick % measure_divisor == 0
            || self.tick % measure_divisor == measure_divisor - 1;

        let mute_requests = TrackState::IMMEDIATE_MUTE_REQUEST
            | if handle_synced { TrackState::SYNCED_MUTE_REQUEST } else { 0 }
            | if handle_latched { TrackState::LATCHED_MUTE_REQUEST } else { 0 };

        let pattern_requests = TrackState::IMMEDIATE_PATTERN_REQUEST
            | if handle_synced { TrackState::SYNCED_PATTERN_REQUEST } else { 0 }
            | if handle_latched { TrackState::LATCHED_PATTERN_REQUEST } else { 0 };

        for i in 0..TRACK_COUNT {
            let state = self.project.play_state_mut().track_state_mut(i);

            if state.has_requests(mute_requests) {
                let mute = state.requested_mute();
                state.set_mute(mute);
            }
            if state.has_requests(pattern_requests) {
                let pattern = state.requested_pattern();
                state.set_pattern(pattern);
            }
            state.clear_requests(mute_requests | pattern_requests);

            let (mute, fill, pattern) = (state.mute(), state.fill(), state.pattern());
            let engine = &mut self.track_engines[i];
            engine.set_mute(mute);
            engine.set_fill(fill);
            engine.set_pattern(pattern as usize);
        }
    }

    fn update_cv_inputs(&mut self) {
        for (channel, value) in self.cv_input_values.iter_mut().enumerate() {
            *value = self.hal.cv_in(channel);
        }
    }

    fn tick_track_engines(&mut self) {
        let tick = self.tick;
        for i in 0..TRACK_COUNT {
            let link_track = self.project.track(i).link_track();
            let link = if link_track >= 0 && (link_track as usize) != i {
                self.track_engines[link_track as usize].link_data()
            } else {
                None
            };
            self.track_engines[i].tick(tick, self.project.track(i), link);
        }
    }

    /// Route logical track outputs onto physical channels, honoring
    /// per-track source selection, idle fallback and overrides.
    fn update_track_outputs(&mut self) {
        let is_idle = self.clock.is_idle();
        let selected = self.project.selected_track_index();
        let mut gate_index = [0usize; TRACK_COUNT];
        let mut cv_index = [0usize; TRACK_COUNT];

        for i in 0..TRACK_COUNT {
            if i != selected {
                self.track_engines[i].clear_idle_output();
            }

            let gate_track = self.project.gate_output_track(i) as usize;
            if !self.gate_output_override {
                let engine = &self.track_engines[gate_track];
                let sub = gate_index[gate_track];
                gate_index[gate_track] += 1;
                let value = if is_idle && engine.idle_output() {
                    engine.idle_gate_output(sub)
                } else {
                    engine.gate_output(sub)
                };
                self.hal.set_gate(i, value);
            }

            let cv_track = self.project.cv_output_track(i) as usize;
            if !self.cv_output_override {
                let engine = &self.track_engines[cv_track];
                let sub = cv_index[cv_track];
                cv_index[cv_track] += 1;
                let volts = if is_idle && engine.idle_output() {
                    engine.idle_cv_output(sub)
                } else {
                    engine.cv_output(sub)
                };
                self.set_cv(i, volts);
            }
        }
    }

    /// Stage a calibrated CV value.
    fn set_cv(&mut self, channel: usize, volts: f32) {
        let corrected = self.project.calibration(channel).apply(volts);
        self.hal.set_cv(channel, corrected);
    }

    fn update_overrides(&mut self) {
        if self.gate_output_override {
            self.hal.set_gates(self.gate_override_mask);
        }
        if self.cv_output_override {
            for channel in 0..TRACK_COUNT {
                let volts = self.cv_override_values[channel];
                self.set_cv(channel, volts);
            }
        }
    }

    /// Forward the clock's MIDI bytes and output lines per the setup.
    fn send_clock_output(&mut self) {
        for byte in self.clock.take_midi_output() {
            let setup = self.project.clock_setup();
            let (midi_tx, usb_tx) = (setup.midi_tx(), setup.usb_tx());
            if midi_tx {
                self.hal.midi_send(MidiPort::Midi, &MidiMessage::realtime(byte));
            }
            if usb_tx {
                self.hal.midi_send(MidiPort::UsbMidi, &MidiMessage::realtime(byte));
            }
        }

        let output = self.clock.output_state();
        self.hal.set_clock_output(output.clock);
        match self.project.clock_setup().clock_output_mode() {
            ClockMode::Reset => self.hal.set_reset_output(output.reset),
            ClockMode::StartStop => self.hal.set_reset_output(output.run),
        }
    }
}
