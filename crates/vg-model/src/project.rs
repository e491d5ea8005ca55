//! The project: everything the engine consumes.

use core::fmt;

use crate::calibration::CvCalibration;
use crate::clock_setup::ClockSetup;
use crate::config::TRACK_COUNT;
use crate::play_state::PlayState;
use crate::routing::Routing;
use crate::track::{TrackConfig, TrackMode};

const BPM_MIN: f32 = 20.0;
const BPM_MAX: f32 = 300.0;

/// Init-time configuration error. The engine reports it and reverts the
/// offending setting to its default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Track link chain forms a cycle.
    LinkCycle { track: usize },
    /// Track links to something that cannot be followed.
    InvalidLinkTarget { track: usize },
    /// MIDI/CV tracks do not link.
    MidiCvLink { track: usize },
}

impl ConfigError {
    /// Short message for the device display.
    pub fn message(&self) -> &'static str {
        match self {
            ConfigError::LinkCycle { .. } => "TRACK LINK CYCLE",
            ConfigError::InvalidLinkTarget { .. } => "INVALID TRACK LINK",
            ConfigError::MidiCvLink { .. } => "MIDI/CV TRACK LINK",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LinkCycle { track } => {
                write!(f, "track {} link forms a cycle", track)
            }
            ConfigError::InvalidLinkTarget { track } => {
                write!(f, "track {} links to an invalid target", track)
            }
            ConfigError::MidiCvLink { track } => {
                write!(f, "track {} is MIDI/CV and cannot link", track)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// The complete project, read by the engine and mutated by the UI under
/// the engine's lock protocol. Play-state requests are the only
/// lock-free mutations.
#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    bpm: f32,
    sync_measure: u32,
    swing: u8,
    tracks: [TrackConfig; TRACK_COUNT],
    play_state: PlayState,
    clock_setup: ClockSetup,
    routing: Routing,
    gate_output_tracks: [u8; TRACK_COUNT],
    cv_output_tracks: [u8; TRACK_COUNT],
    selected_track_index: usize,
    calibration: [CvCalibration; TRACK_COUNT],
}

impl Default for Project {
    fn default() -> Self {
        let mut identity = [0u8; TRACK_COUNT];
        for (i, entry) in identity.iter_mut().enumerate() {
            *entry = i as u8;
        }
        Self {
            bpm: 120.0,
            sync_measure: 1,
            swing: 50,
            tracks: [TrackConfig::default(); TRACK_COUNT],
            play_state: PlayState::default(),
            clock_setup: ClockSetup::default(),
            routing: Routing::default(),
            gate_output_tracks: identity,
            cv_output_tracks: identity,
            selected_track_index: 0,
            calibration: [CvCalibration::default(); TRACK_COUNT],
        }
    }
}

impl Project {
    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.bpm = bpm.clamp(BPM_MIN, BPM_MAX);
    }

    /// Bar length at which synced requests commit.
    pub fn sync_measure(&self) -> u32 {
        self.sync_measure
    }

    pub fn set_sync_measure(&mut self, sync_measure: u32) {
        self.sync_measure = sync_measure.clamp(1, 128);
    }

    /// Swing in percent, 50 (straight) to 75.
    pub fn swing(&self) -> u8 {
        self.swing
    }

    pub fn set_swing(&mut self, swing: u8) {
        self.swing = swing.clamp(50, 75);
    }

    pub fn track(&self, index: usize) -> &TrackConfig {
        &self.tracks[index.min(TRACK_COUNT - 1)]
    }

    pub fn track_mut(&mut self, index: usize) -> &mut TrackConfig {
        &mut self.tracks[index.min(TRACK_COUNT - 1)]
    }

    pub fn play_state(&self) -> &PlayState {
        &self.play_state
    }

    pub fn play_state_mut(&mut self) -> &mut PlayState {
        &mut self.play_state
    }

    pub fn clock_setup(&self) -> &ClockSetup {
        &self.clock_setup
    }

    pub fn clock_setup_mut(&mut self) -> &mut ClockSetup {
        &mut self.clock_setup
    }

    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    pub fn routing_mut(&mut self) -> &mut Routing {
        &mut self.routing
    }

    /// Logical track feeding physical gate channel `channel`.
    pub fn gate_output_track(&self, channel: usize) -> u8 {
        self.gate_output_tracks[channel.min(TRACK_COUNT - 1)]
    }

    pub fn set_gate_output_track(&mut self, channel: usize, track: u8) {
        self.gate_output_tracks[channel.min(TRACK_COUNT - 1)] = track.min(TRACK_COUNT as u8 - 1);
    }

    /// Logical track feeding physical CV channel `channel`.
    pub fn cv_output_track(&self, channel: usize) -> u8 {
        self.cv_output_tracks[channel.min(TRACK_COUNT - 1)]
    }

    pub fn set_cv_output_track(&mut self, channel: usize, track: u8) {
        self.cv_output_tracks[channel.min(TRACK_COUNT - 1)] = track.min(TRACK_COUNT as u8 - 1);
    }

    pub fn selected_track_index(&self) -> usize {
        self.selected_track_index
    }

    pub fn set_selected_track_index(&mut self, index: usize) {
        self.selected_track_index = index.min(TRACK_COUNT - 1);
    }

    pub fn calibration(&self, channel: usize) -> &CvCalibration {
        &self.calibration[channel.min(TRACK_COUNT - 1)]
    }

    pub fn calibration_mut(&mut self, channel: usize) -> &mut CvCalibration {
        &mut self.calibration[channel.min(TRACK_COUNT - 1)]
    }

    /// Check the cross-track invariants that setters cannot enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, track) in self.tracks.iter().enumerate() {
            let link = track.link_track();
            if link < 0 {
                continue;
            }
            if track.mode() == TrackMode::MidiCv {
                return Err(ConfigError::MidiCvLink { track: index });
            }
            let target = link as usize;
            if target == index || self.tracks[target].mode() == TrackMode::MidiCv {
                return Err(ConfigError::InvalidLinkTarget { track: index });
            }
            // follow the chain; more than TRACK_COUNT hops means a cycle
            let mut current = target;
            for _ in 0..TRACK_COUNT {
                let next = self.tracks[current].link_track();
                if next < 0 {
                    break;
                }
                if next as usize == index {
                    return Err(ConfigError::LinkCycle { track: index });
                }
                current = next as usize;
            }
        }
        Ok(())
    }

    /// Revert the setting named by a validation error to its default.
    pub fn revert(&mut self, error: &ConfigError) {
        match error {
            ConfigError::LinkCycle { track }
            | ConfigError::InvalidLinkTarget { track }
            | ConfigError::MidiCvLink { track } => {
                self.track_mut(*track).set_link_track(-1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_maps_are_identity() {
        let project = Project::default();
        for i in 0..TRACK_COUNT {
            assert_eq!(project.gate_output_track(i), i as u8);
            assert_eq!(project.cv_output_track(i), i as u8);
        }
    }

    #[test]
    fn bpm_and_swing_clamped() {
        let mut project = Project::default();
        project.set_bpm(1000.0);
        assert_eq!(project.bpm(), BPM_MAX);
        project.set_swing(10);
        assert_eq!(project.swing(), 50);
        project.set_sync_measure(0);
        assert_eq!(project.sync_measure(), 1);
    }

    #[test]
    fn validate_detects_link_cycle() {
        let mut project = Project::default();
        project.track_mut(0).set_link_track(1);
        project.track_mut(1).set_link_track(0);
        assert!(matches!(
            project.validate(),
            Err(ConfigError::LinkCycle { .. })
        ));
    }

    #[test]
    fn validate_rejects_self_link() {
        let mut project = Project::default();
        project.track_mut(2).set_link_track(2);
        assert_eq!(
            project.validate(),
            Err(ConfigError::InvalidLinkTarget { track: 2 })
        );
    }

    #[test]
    fn validate_rejects_midi_cv_links() {
        let mut project = Project::default();
        project.track_mut(1).set_mode(TrackMode::MidiCv);
        project.track_mut(1).set_link_track(0);
        assert_eq!(project.validate(), Err(ConfigError::MidiCvLink { track: 1 }));

        let mut project = Project::default();
        project.track_mut(1).set_mode(TrackMode::MidiCv);
        project.track_mut(0).set_link_track(1);
        assert_eq!(
            project.validate(),
            Err(ConfigError::InvalidLinkTarget { track: 0 })
        );
    }

    #[test]
    fn revert_fixes_the_error() {
        let mut project = Project::default();
        project.track_mut(0).set_link_track(1);
        project.track_mut(1).set_link_track(0);
        while let Err(error) = project.validate() {
            project.revert(&error);
        }
        assert!(project.validate().is_ok());
    }

    #[test]
    fn chained_links_are_valid() {
        let mut project = Project::default();
        project.track_mut(2).set_link_track(1);
        project.track_mut(1).set_link_track(0);
        assert!(project.validate().is_ok());
    }
}
