//! Play state: per-track mute/fill/pattern and the staged request machine.
//!
//! The UI never commits mute or pattern changes directly. It stages a
//! requested value together with a timing class (immediate, synced to
//! the measure, or latched behind a held button); the engine consumes
//! the staged requests at tick boundaries.

use crate::config::{PATTERN_COUNT, TRACK_COUNT};

/// Timing class of a staged request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecuteType {
    /// Commit on the next tick.
    Immediate,
    /// Commit at the sync-measure boundary.
    Synced,
    /// Commit when the latch is released.
    Latched,
}

/// Per-track play state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackState {
    mute: bool,
    fill: bool,
    pattern: u8,
    requested_mute: bool,
    requested_pattern: u8,
    requests: u8,
}

impl TrackState {
    pub const IMMEDIATE_MUTE_REQUEST: u8 = 1 << 0;
    pub const SYNCED_MUTE_REQUEST: u8 = 1 << 1;
    pub const LATCHED_MUTE_REQUEST: u8 = 1 << 2;
    pub const IMMEDIATE_PATTERN_REQUEST: u8 = 1 << 3;
    pub const SYNCED_PATTERN_REQUEST: u8 = 1 << 4;
    pub const LATCHED_PATTERN_REQUEST: u8 = 1 << 5;

    pub const IMMEDIATE_REQUESTS: u8 =
        Self::IMMEDIATE_MUTE_REQUEST | Self::IMMEDIATE_PATTERN_REQUEST;
    pub const SYNCED_REQUESTS: u8 = Self::SYNCED_MUTE_REQUEST | Self::SYNCED_PATTERN_REQUEST;
    pub const LATCHED_REQUESTS: u8 = Self::LATCHED_MUTE_REQUEST | Self::LATCHED_PATTERN_REQUEST;

    pub fn mute(&self) -> bool {
        self.mute
    }

    /// Commit a mute value (engine side).
    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    pub fn fill(&self) -> bool {
        self.fill
    }

    /// Fill is momentary and commits directly.
    pub fn set_fill(&mut self, fill: bool) {
        self.fill = fill;
    }

    pub fn pattern(&self) -> u8 {
        self.pattern
    }

    /// Commit a pattern value (engine side).
    pub fn set_pattern(&mut self, pattern: u8) {
        self.pattern = pattern.min(PATTERN_COUNT as u8 - 1);
    }

    pub fn requested_mute(&self) -> bool {
        self.requested_mute
    }

    pub fn requested_pattern(&self) -> u8 {
        self.requested_pattern
    }

    pub fn has_requests(&self, mask: u8) -> bool {
        self.requests & mask != 0
    }

    pub fn set_requests(&mut self, mask: u8) {
        self.requests |= mask;
    }

    pub fn clear_requests(&mut self, mask: u8) {
        self.requests &= !mask;
    }
}

/// Play state for all tracks plus the latch release flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayState {
    track_states: [TrackState; TRACK_COUNT],
    latched_release: bool,
}

impl PlayState {
    pub fn track_state(&self, track: usize) -> &TrackState {
        &self.track_states[track.min(TRACK_COUNT - 1)]
    }

    pub fn track_state_mut(&mut self, track: usize) -> &mut TrackState {
        &mut self.track_states[track.min(TRACK_COUNT - 1)]
    }

    /// Stage a mute request for one track.
    pub fn request_mute(&mut self, track: usize, mute: bool, execute: ExecuteType) {
        let state = self.track_state_mut(track);
        state.requested_mute = mute;
        state.set_requests(match execute {
            ExecuteType::Immediate => TrackState::IMMEDIATE_MUTE_REQUEST,
            ExecuteType::Synced => TrackState::SYNCED_MUTE_REQUEST,
            ExecuteType::Latched => TrackState::LATCHED_MUTE_REQUEST,
        });
    }

    /// Stage a pattern request for one track.
    pub fn request_pattern(&mut self, track: usize, pattern: u8, execute: ExecuteType) {
        let state = self.track_state_mut(track);
        state.requested_pattern = pattern.min(PATTERN_COUNT as u8 - 1);
        state.set_requests(match execute {
            ExecuteType::Immediate => TrackState::IMMEDIATE_PATTERN_REQUEST,
            ExecuteType::Synced => TrackState::SYNCED_PATTERN_REQUEST,
            ExecuteType::Latched => TrackState::LATCHED_PATTERN_REQUEST,
        });
    }

    pub fn set_fill(&mut self, track: usize, fill: bool) {
        self.track_state_mut(track).set_fill(fill);
    }

    /// UI released the latch: pending latched requests fire on the next tick.
    pub fn commit_latched_requests(&mut self) {
        self.latched_release = true;
    }

    /// One-shot: true once after the latch was released.
    pub fn execute_latched_requests(&mut self) -> bool {
        let release = self.latched_release;
        self.latched_release = false;
        release
    }

    pub fn has_immediate_requests(&self) -> bool {
        self.track_states
            .iter()
            .any(|s| s.has_requests(TrackState::IMMEDIATE_REQUESTS))
    }

    pub fn has_synced_requests(&self) -> bool {
        self.track_states
            .iter()
            .any(|s| s.has_requests(TrackState::SYNCED_REQUESTS))
    }

    pub fn has_latched_requests(&self) -> bool {
        self.track_states
            .iter()
            .any(|s| s.has_requests(TrackState::LATCHED_REQUESTS))
    }
}
