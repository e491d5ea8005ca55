//! End-to-end engine scenarios against the simulated hardware.
//!
//! The engine runs at a 1 ms update cadence, the cadence the device
//! firmware uses. Tick values are read back from the engine so the
//! assertions are independent of wall-clock rounding.

use vg_engine::Engine;
use vg_hal::SimHal;
use vg_model::config::{PPQN, TRACK_COUNT};
use vg_model::{ExecuteType, MidiMessage, MidiPort, Project, TrackMode};

fn engine_with(project: Project) -> Engine<SimHal> {
    let mut engine = Engine::new(SimHal::new(), project);
    engine.init();
    engine
}

fn run_ms(engine: &mut Engine<SimHal>, ms: u32) {
    for _ in 0..ms {
        engine.hal_mut().advance(1000);
        engine.update();
    }
}

/// Step until the engine has processed `target` (panics if the clock
/// stalls).
fn run_until_tick(engine: &mut Engine<SimHal>, target: u32) {
    for _ in 0..600_000 {
        if engine.tick() >= target {
            return;
        }
        engine.hal_mut().advance(1000);
        engine.update();
    }
    panic!("clock never reached tick {}", target);
}

/// Track 0 plays quarter-note kicks on a 16th-note grid, one octave up
/// so the CV is distinguishable from silence.
fn kick_project() -> Project {
    let mut project = Project::default();
    let kick = project.track_mut(0).note_mut().unwrap();
    for step in [0, 4, 8, 12] {
        let s = kick.sequences[0].step_mut(step);
        s.set_gate(true);
        s.set_note(12);
    }
    project
}

// === S1: start + 4/4 kick ===

#[test]
fn s1_four_on_the_floor_gates() {
    let mut engine = engine_with(kick_project());
    engine.start();

    let mut rises = Vec::new();
    let mut falls = Vec::new();
    let mut previous = false;
    // stop just short of the next downbeat at tick 768
    while engine.tick() < PPQN * 4 - 1 {
        engine.hal_mut().advance(1000);
        engine.update();
        let gate = engine.hal().gate(0);
        if gate && !previous {
            rises.push(engine.tick());
        }
        if !gate && previous {
            falls.push(engine.tick());
        }
        previous = gate;
    }

    assert_eq!(rises, vec![0, 192, 384, 576]);
    assert_eq!(falls.len(), 4);
    for (rise, fall) in rises.iter().zip(&falls) {
        assert!(fall - rise <= 48, "gate held from {} to {}", rise, fall);
    }
}

// === S2: synced pattern change ===

#[test]
fn s2_synced_pattern_change_commits_at_measure_boundary() {
    let mut project = kick_project();
    // pattern 1: a single hit on step 0 with a different note
    let track = project.track_mut(0).note_mut().unwrap();
    let s = track.sequences[1].step_mut(0);
    s.set_gate(true);
    s.set_note(7);

    let mut engine = engine_with(project);
    engine.start();

    run_until_tick(&mut engine, 200);
    engine
        .project_mut()
        .play_state_mut()
        .request_pattern(0, 1, ExecuteType::Synced);

    // no commit before the boundary
    run_until_tick(&mut engine, 700);
    assert_eq!(engine.project().play_state().track_state(0).pattern(), 0);

    // commit lands on the last tick of the measure
    run_until_tick(&mut engine, 767);
    assert_eq!(engine.project().play_state().track_state(0).pattern(), 1);

    // the new pattern's tick-0 outputs appear at the downbeat
    run_until_tick(&mut engine, 768);
    assert!(engine.hal().gate(0));
    assert!((engine.hal().cv(0) - 7.0 / 12.0).abs() < 1e-6);
}

// === S3: MIDI clock slave ===

#[test]
fn s3_midi_clock_slave_follows_the_wire() {
    let mut engine = engine_with(Project::default());
    engine.project_mut().clock_setup_mut().set_midi_rx(true);
    // apply the clock setup before traffic arrives
    run_ms(&mut engine, 1);

    engine.hal_mut().midi_push(MidiPort::Midi, &[0xfa]);
    let mut sent = 0;
    for ms in 0..510u32 {
        if ms % 21 == 0 && sent < 24 {
            engine.hal_mut().midi_push(MidiPort::Midi, &[0xf8]);
            sent += 1;
        }
        engine.hal_mut().advance(1000);
        engine.update();
    }

    assert!(engine.is_running());
    // 24 clocks at PPQN/24 per clock = 192 ticks, 0..=191
    assert_eq!(engine.tick(), 191);

    engine.hal_mut().midi_push(MidiPort::Midi, &[0xfc]);
    run_ms(&mut engine, 2);
    assert!(!engine.is_running());

    engine.hal_mut().midi_push(MidiPort::Midi, &[0xfb]);
    run_ms(&mut engine, 2);
    assert!(engine.is_running());
}

// === S4: lock safety ===

fn locked_run(traffic: bool) -> (Project, u8, Vec<f32>) {
    let mut engine = engine_with(kick_project());
    engine.start();
    run_ms(&mut engine, 100);

    engine.lock();
    if traffic {
        for _ in 0..1000 {
            engine
                .hal_mut()
                .midi_push(MidiPort::Midi, &[0x90, 60, 100, 0x80, 60, 0]);
        }
        for _ in 0..200 {
            engine.hal_mut().midi_push(MidiPort::Midi, &[0xf8]);
        }
    }
    run_ms(&mut engine, 50);
    engine.unlock();

    let cv: Vec<f32> = (0..TRACK_COUNT).map(|ch| engine.hal().cv(ch)).collect();
    (engine.project().clone(), engine.hal().gates(), cv)
}

#[test]
fn s4_traffic_under_lock_changes_nothing() {
    let control = locked_run(false);
    let with_traffic = locked_run(true);
    assert_eq!(control.0, with_traffic.0);
    assert_eq!(control.1, with_traffic.1);
    assert_eq!(control.2, with_traffic.2);
}

#[test]
fn tick_does_not_advance_while_locked() {
    let mut engine = engine_with(kick_project());
    engine.start();
    run_ms(&mut engine, 100);

    engine.lock();
    let frozen = engine.tick();
    run_ms(&mut engine, 100);
    assert_eq!(engine.tick(), frozen);
    engine.unlock();
}

// === S5: overrides ===

#[test]
fn s5_cv_override_wins_and_releases() {
    let mut engine = engine_with(kick_project());
    engine.start();
    run_ms(&mut engine, 10);

    for channel in 0..TRACK_COUNT {
        engine.set_cv_output_override_value(channel, channel as f32);
    }
    engine.set_cv_output_override(true);
    run_ms(&mut engine, 1);
    for channel in 0..TRACK_COUNT {
        assert_eq!(engine.hal().cv(channel), channel as f32);
    }

    engine.set_cv_output_override(false);
    run_ms(&mut engine, 1);
    // routed output: the kick plays note 12 = 1V
    assert!((engine.hal().cv(0) - 1.0).abs() < 1e-6);
    assert_eq!(engine.hal().cv(3), 0.0);
}

#[test]
fn gate_override_masks_all_channels() {
    let mut engine = engine_with(kick_project());
    engine.start();
    engine.set_gate_output_override_value(0b1010_1010);
    engine.set_gate_output_override(true);
    run_ms(&mut engine, 1);
    assert_eq!(engine.hal().gates(), 0b1010_1010);

    engine.set_gate_output_override(false);
    run_until_tick(&mut engine, 10);
    // back to routed gates: only the kick channel is high
    assert_eq!(engine.hal().gates(), 0b0000_0001);
}

// === S6: nudge ===

#[test]
fn s6_nudge_scales_the_tick_rate() {
    let mut engine = engine_with(kick_project());
    engine.start();

    engine.nudge_tempo_set_direction(1);
    run_ms(&mut engine, 2100);
    assert!((engine.nudge_tempo_strength() - 1.0).abs() < 0.01);

    // 120 + 10 BPM = 416 ticks/s
    let before = engine.tick();
    run_ms(&mut engine, 1000);
    let rate = engine.tick() - before;
    assert!((410..=422).contains(&rate), "rate was {}", rate);

    engine.nudge_tempo_set_direction(0);
    run_ms(&mut engine, 2100);
    assert_eq!(engine.nudge_tempo_strength(), 0.0);

    let before = engine.tick();
    run_ms(&mut engine, 1000);
    let rate = engine.tick() - before;
    assert!((378..=390).contains(&rate), "rate was {}", rate);
}

// === invariant: requests converge to the last requested values ===

#[test]
fn requests_converge_once_boundary_and_latch_pass() {
    let mut engine = engine_with(kick_project());
    engine.start();
    run_until_tick(&mut engine, 10);

    {
        let play_state = engine.project_mut().play_state_mut();
        play_state.request_mute(0, true, ExecuteType::Immediate);
        play_state.request_mute(1, true, ExecuteType::Synced);
        play_state.request_pattern(1, 3, ExecuteType::Synced);
        play_state.request_mute(2, true, ExecuteType::Latched);
        play_state.request_pattern(2, 5, ExecuteType::Latched);
        // a later request supersedes the staged value
        play_state.request_mute(0, false, ExecuteType::Immediate);
    }

    run_until_tick(&mut engine, 300);
    engine.project_mut().play_state_mut().commit_latched_requests();
    // past the latch release and the measure boundary
    run_until_tick(&mut engine, 800);

    let play_state = engine.project().play_state();
    assert!(!play_state.track_state(0).mute());
    assert!(play_state.track_state(1).mute());
    assert_eq!(play_state.track_state(1).pattern(), 3);
    assert!(play_state.track_state(2).mute());
    assert_eq!(play_state.track_state(2).pattern(), 5);
}

// === invariant: tick is monotonic between starts ===

#[test]
fn tick_is_monotonic_and_resets_on_start() {
    let mut engine = engine_with(kick_project());
    engine.start();

    let mut last = 0;
    for _ in 0..500 {
        engine.hal_mut().advance(1000);
        engine.update();
        assert!(engine.tick() >= last);
        last = engine.tick();
    }
    assert!(last > 0);

    engine.start();
    run_ms(&mut engine, 10);
    assert!(engine.tick() < last);
}

// === invariant: idle outputs are confined to the selected track ===

#[test]
fn idle_output_shows_only_on_the_selected_track() {
    let mut engine = engine_with(kick_project());
    // transport stopped: the engine is idle

    engine.track_engine_mut(0).monitor_note(24);
    run_ms(&mut engine, 1);
    assert!((engine.hal().cv(0) - 2.0).abs() < 1e-6);

    // a non-selected track's idle state is cleared by the router
    engine.track_engine_mut(1).monitor_note(24);
    run_ms(&mut engine, 1);
    assert_eq!(engine.hal().cv(1), 0.0);
}

// === invariant: swing takes effect on the following trigger ===

#[test]
fn swing_shifts_only_upcoming_steps() {
    let mut project = Project::default();
    let track = project.track_mut(0).note_mut().unwrap();
    track.sequences[0].step_mut(1).set_gate(true);
    track.sequences[0].step_mut(3).set_gate(true);

    let mut engine = engine_with(project);
    engine.start();

    let mut rises = Vec::new();
    let mut previous = false;
    let mut swung = false;
    while engine.tick() < PPQN {
        engine.hal_mut().advance(1000);
        engine.update();
        if engine.tick() >= 60 && !swung {
            // change swing between step 1 and step 3
            engine.lock();
            engine.project_mut().set_swing(75);
            engine.unlock();
            engine.resume();
            swung = true;
        }
        let gate = engine.hal().gate(0);
        if gate && !previous {
            rises.push(engine.tick());
        }
        previous = gate;
    }

    // step 1 fired straight at 48; step 3 swings to 144 + 12
    assert_eq!(rises, vec![48, 156]);
}

// === laws ===

#[test]
fn lock_unlock_is_idempotent() {
    let mut engine = engine_with(Project::default());
    assert!(!engine.is_locked());
    engine.lock();
    assert!(engine.is_locked());
    engine.lock();
    assert!(engine.is_locked());
    engine.unlock();
    assert!(!engine.is_locked());
    engine.unlock();
    assert!(!engine.is_locked());
}

#[test]
fn sync_measure_fraction_stays_in_unit_interval() {
    let mut engine = engine_with(kick_project());
    engine.start();
    run_until_tick(&mut engine, 0);
    assert_eq!(engine.sync_measure_fraction(), 0.0);

    run_until_tick(&mut engine, 384);
    assert!((engine.sync_measure_fraction() - 0.5).abs() < 1e-6);

    for _ in 0..2000 {
        engine.hal_mut().advance(1000);
        engine.update();
        let fraction = engine.sync_measure_fraction();
        assert!((0.0..1.0).contains(&fraction));
        if engine.tick() % 768 == 0 {
            assert_eq!(fraction, 0.0);
        }
    }
}

// === supplement: engine reverts invalid configuration at init ===

#[test]
fn init_reverts_link_cycles_and_reports() {
    let mut project = Project::default();
    project.track_mut(0).set_link_track(1);
    project.track_mut(1).set_link_track(0);

    let mut engine = Engine::new(SimHal::new(), project);
    let messages = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = messages.clone();
    engine.set_message_handler(Box::new(move |text, _duration| {
        sink.lock().unwrap().push(text.to_string());
    }));
    engine.init();

    assert!(engine.project().validate().is_ok());
    assert!(!messages.lock().unwrap().is_empty());
}

// === supplement: linked track follows the link's position ===

#[test]
fn linked_track_fires_with_its_link() {
    let mut project = kick_project();
    // track 1 links to track 0 and shares its grid
    project.track_mut(1).set_link_track(0);
    let track = project.track_mut(1).note_mut().unwrap();
    track.sequences[0].step_mut(0).set_gate(true);
    // a divisor the linked track would otherwise ignore
    track.sequences[0].set_divisor(1);

    let mut engine = engine_with(project);
    engine.start();
    run_ms(&mut engine, 10);
    // both fire on the shared downbeat
    assert!(engine.hal().gate(0));
    assert!(engine.hal().gate(1));
}

// === supplement: multi-voice MIDI/CV track fans out over channels ===

#[test]
fn midi_cv_track_feeds_multiple_physical_channels() {
    let mut project = Project::default();
    project.track_mut(0).set_mode(TrackMode::MidiCv);
    project.track_mut(0).midi_cv_mut().unwrap().set_voices(2);
    // both physical channels 0 and 1 read from logical track 0
    project.set_gate_output_track(1, 0);
    project.set_cv_output_track(1, 0);

    let mut engine = engine_with(project);
    engine.start();

    let chord = [
        MidiMessage::note_on(0, 60, 100),
        MidiMessage::note_on(0, 67, 100),
    ];
    let mut bytes = Vec::new();
    for msg in chord {
        bytes.extend_from_slice(&[msg.status(), msg.data0(), msg.data1()]);
    }
    engine.hal_mut().midi_push(MidiPort::Midi, &bytes);
    run_ms(&mut engine, 2);

    // voice 0 on channel 0, voice 1 on channel 1
    assert!(engine.hal().gate(0));
    assert!(engine.hal().gate(1));
    assert_eq!(engine.hal().cv(0), 0.0);
    assert!((engine.hal().cv(1) - 7.0 / 12.0).abs() < 1e-6);
}

// === supplement: boundary errors surface as sticky flags ===

#[test]
fn overflow_and_peripheral_errors_stick_until_cleared() {
    let mut engine = engine_with(kick_project());
    engine.start();

    // flood the normal ring; clock bytes keep their privileged path
    let noise = [0x90, 60, 100];
    for _ in 0..2000 {
        engine.hal_mut().midi_push(MidiPort::Midi, &noise);
    }
    engine.hal_mut().fail_peripheral();
    run_ms(&mut engine, 2);

    let flags = engine.error_flags();
    assert!(flags.midi_overflow);
    assert!(flags.peripheral);

    engine.clear_error_flags();
    run_ms(&mut engine, 2);
    assert_eq!(engine.error_flags(), vg_engine::ErrorFlags::default());
}

// === supplement: clock TX gating ===

#[test]
fn clock_tx_respects_port_flags() {
    let mut engine = engine_with(kick_project());
    engine.project_mut().clock_setup_mut().set_midi_tx(true);
    run_ms(&mut engine, 1);

    engine.start();
    run_ms(&mut engine, 100);

    let sent = engine.hal().sent_midi();
    assert!(sent.iter().any(|(port, msg)| *port == MidiPort::Midi && msg.status() == 0xfa));
    assert!(sent.iter().any(|(port, msg)| *port == MidiPort::Midi && msg.status() == 0xf8));
    // USB TX is off
    assert!(sent.iter().all(|(port, _)| *port == MidiPort::Midi));
}
