//! Simulated peripherals for tests and the host simulator.

use std::collections::VecDeque;

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use vg_model::config::{CV_INPUT_COUNT, TRACK_COUNT};
use vg_model::{MidiMessage, MidiPort};

use crate::traits::{DioEvent, Hal};

const MIDI_RING_CAPACITY: usize = 256;
const REALTIME_RING_CAPACITY: usize = 64;

/// One simulated MIDI transceiver: a normal byte ring plus the
/// privileged realtime ring the wire-side classifier fills.
struct MidiWire {
    producer: HeapProd<u8>,
    consumer: HeapCons<u8>,
    realtime_producer: HeapProd<u8>,
    realtime_consumer: HeapCons<u8>,
}

impl MidiWire {
    fn new() -> Self {
        let (producer, consumer) = HeapRb::<u8>::new(MIDI_RING_CAPACITY).split();
        let (realtime_producer, realtime_consumer) =
            HeapRb::<u8>::new(REALTIME_RING_CAPACITY).split();
        Self { producer, consumer, realtime_producer, realtime_consumer }
    }
}

/// In-memory stand-in for the device peripherals.
///
/// Time is advanced manually with `advance`; outputs are recorded so
/// tests can observe gate masks, latched CV values and sent MIDI.
pub struct SimHal {
    now_us: u64,
    gates: u8,
    cv_staged: [f32; TRACK_COUNT],
    cv_latched: [f32; TRACK_COUNT],
    cv_inputs: [f32; CV_INPUT_COUNT],
    clock_output: bool,
    reset_output: bool,
    dio_events: VecDeque<DioEvent>,
    wires: [MidiWire; 2],
    sent: Vec<(MidiPort, MidiMessage)>,
    midi_overflow: bool,
    peripheral_error: bool,
}

impl Default for SimHal {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHal {
    pub fn new() -> Self {
        let mut dio_events = VecDeque::new();
        dio_events.reserve(64);
        Self {
            now_us: 0,
            gates: 0,
            cv_staged: [0.0; TRACK_COUNT],
            cv_latched: [0.0; TRACK_COUNT],
            cv_inputs: [0.0; CV_INPUT_COUNT],
            clock_output: false,
            reset_output: false,
            dio_events,
            wires: [MidiWire::new(), MidiWire::new()],
            sent: Vec::with_capacity(4096),
            midi_overflow: false,
            peripheral_error: false,
        }
    }

    /// Advance the simulated clock.
    pub fn advance(&mut self, us: u64) {
        self.now_us += us;
    }

    /// Push raw bytes onto a port's wire, as the receive ISR would.
    /// Clock realtime bytes take the privileged ring; the normal ring
    /// drops its oldest byte on overflow and raises the sticky flag.
    pub fn midi_push(&mut self, port: MidiPort, bytes: &[u8]) {
        let wire = &mut self.wires[port as usize];
        let mut overflow = false;
        for &byte in bytes {
            if MidiMessage::is_clock_byte(byte) {
                let _ = wire.realtime_producer.try_push(byte);
            } else if wire.producer.try_push(byte).is_err() {
                let _ = wire.consumer.try_pop();
                let _ = wire.producer.try_push(byte);
                overflow = true;
            }
        }
        if overflow {
            self.midi_overflow = true;
        }
    }

    /// Queue a clock input transition.
    pub fn push_clock_edge(&mut self, value: bool) {
        self.dio_events.push_back(DioEvent::ClockEdge(value));
    }

    /// Queue a reset input transition.
    pub fn push_reset_edge(&mut self, value: bool) {
        self.dio_events.push_back(DioEvent::ResetEdge(value));
    }

    /// Set a CV input voltage.
    pub fn set_cv_in(&mut self, channel: usize, volts: f32) {
        if channel < CV_INPUT_COUNT {
            self.cv_inputs[channel] = volts;
        }
    }

    /// Current gate output mask.
    pub fn gates(&self) -> u8 {
        self.gates
    }

    /// Level of one gate output.
    pub fn gate(&self, channel: usize) -> bool {
        self.gates & (1 << channel) != 0
    }

    /// Latched (flushed) CV output value.
    pub fn cv(&self, channel: usize) -> f32 {
        self.cv_latched[channel.min(TRACK_COUNT - 1)]
    }

    pub fn clock_output(&self) -> bool {
        self.clock_output
    }

    pub fn reset_output(&self) -> bool {
        self.reset_output
    }

    /// Inject a simulated DAC/ADC bus failure.
    pub fn fail_peripheral(&mut self) {
        self.peripheral_error = true;
    }

    /// Everything transmitted via `midi_send`.
    pub fn sent_midi(&self) -> &[(MidiPort, MidiMessage)] {
        &self.sent
    }

    pub fn clear_sent_midi(&mut self) {
        self.sent.clear();
    }
}

impl Hal for SimHal {
    fn now_us(&self) -> u64 {
        self.now_us
    }

    fn set_gate(&mut self, channel: usize, value: bool) {
        if channel < TRACK_COUNT {
            if value {
                self.gates |= 1 << channel;
            } else {
                self.gates &= !(1 << channel);
            }
        }
    }

    fn set_gates(&mut self, mask: u8) {
        self.gates = mask;
    }

    fn set_cv(&mut self, channel: usize, volts: f32) {
        if channel < TRACK_COUNT {
            self.cv_staged[channel] = volts;
        }
    }

    fn flush_cv(&mut self) {
        self.cv_latched = self.cv_staged;
    }

    fn cv_in(&self, channel: usize) -> f32 {
        self.cv_inputs[channel.min(CV_INPUT_COUNT - 1)]
    }

    fn set_clock_output(&mut self, value: bool) {
        self.clock_output = value;
    }

    fn set_reset_output(&mut self, value: bool) {
        self.reset_output = value;
    }

    fn midi_send(&mut self, port: MidiPort, message: &MidiMessage) {
        self.sent.push((port, *message));
    }

    fn midi_poll(&mut self, port: MidiPort) -> Option<u8> {
        self.wires[port as usize].consumer.try_pop()
    }

    fn midi_poll_realtime(&mut self, port: MidiPort) -> Option<u8> {
        self.wires[port as usize].realtime_consumer.try_pop()
    }

    fn next_dio_event(&mut self) -> Option<DioEvent> {
        self.dio_events.pop_front()
    }

    fn take_midi_overflow(&mut self) -> bool {
        let overflow = self.midi_overflow;
        self.midi_overflow = false;
        overflow
    }

    fn take_peripheral_error(&mut self) -> bool {
        let error = self.peripheral_error;
        self.peripheral_error = false;
        error
    }
}
