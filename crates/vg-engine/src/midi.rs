//! MIDI byte framing and the MIDI-learn consumer.

use vg_model::{MidiMessage, MidiPort};

/// Assembles `MidiMessage` frames from a port's byte stream.
///
/// Clock realtime bytes never reach the parser (they are classified at
/// the wire side); any other realtime byte is passed over without
/// disturbing the frame in progress. Running status is honored for
/// channel messages and cleared by system common messages.
#[derive(Default)]
pub struct MidiParser {
    status: u8,
    data: [u8; 2],
    have: usize,
}

impl MidiParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns a message when a frame completes.
    pub fn feed(&mut self, byte: u8) -> Option<MidiMessage> {
        if MidiMessage::is_realtime_byte(byte) {
            return None;
        }

        if byte & 0x80 != 0 {
            self.status = byte;
            self.have = 0;
            if MidiMessage::data_length(byte) == 0 {
                let message = MidiMessage::new(byte, 0, 0);
                self.status = 0;
                return Some(message);
            }
            return None;
        }

        if self.status == 0 {
            // stray data byte
            return None;
        }

        self.data[self.have.min(1)] = byte;
        self.have += 1;
        if self.have >= MidiMessage::data_length(self.status) {
            let message = match self.have {
                1 => MidiMessage::new(self.status, self.data[0], 0),
                _ => MidiMessage::new(self.status, self.data[0], self.data[1]),
            };
            self.have = 0;
            if self.status >= 0xf0 {
                // system common does not establish running status
                self.status = 0;
            }
            return Some(message);
        }
        None
    }
}

/// What a MIDI-learn pass captured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiLearnResult {
    ControlChange { port: MidiPort, channel: u8, controller: u8 },
    Note { port: MidiPort, channel: u8, note: u8 },
    PitchBend { port: MidiPort, channel: u8 },
}

/// Armable consumer that captures the next mappable message for the UI
/// to turn into a route.
#[derive(Default)]
pub struct MidiLearn {
    armed: bool,
    result: Option<MidiLearnResult>,
}

impl MidiLearn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self) {
        self.armed = true;
        self.result = None;
    }

    pub fn cancel(&mut self) {
        self.armed = false;
        self.result = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Consume the captured mapping, if any.
    pub fn take_result(&mut self) -> Option<MidiLearnResult> {
        self.result.take()
    }

    pub fn receive_midi(&mut self, port: MidiPort, message: &MidiMessage) {
        if !self.armed {
            return;
        }
        let result = if message.is_control_change() {
            Some(MidiLearnResult::ControlChange {
                port,
                channel: message.channel(),
                controller: message.controller(),
            })
        } else if message.is_note_on() {
            Some(MidiLearnResult::Note {
                port,
                channel: message.channel(),
                note: message.note(),
            })
        } else if message.is_pitch_bend() {
            Some(MidiLearnResult::PitchBend { port, channel: message.channel() })
        } else {
            None
        };
        if result.is_some() {
            self.result = result;
            self.armed = false;
        }
    }
}
