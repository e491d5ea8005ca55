//! Allocation-free update path tests.
//!
//! These verify that `Engine::update()` does not allocate after init,
//! including while draining ticks, parsing MIDI traffic and serving
//! play-state requests.
//!
//! Just run `cargo test` — no feature flags needed.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use vg_engine::Engine;
use vg_hal::SimHal;
use vg_model::{CurveShape, ExecuteType, MidiPort, Project, TrackMode};

fn busy_project() -> Project {
    let mut project = Project::default();
    let notes = project.track_mut(0).note_mut().unwrap();
    for step in 0..16 {
        notes.sequences[0].step_mut(step).set_gate(step % 2 == 0);
    }
    project.track_mut(1).set_mode(TrackMode::Curve);
    let curve = project.track_mut(1).curve_mut().unwrap();
    for step in 0..16 {
        curve.sequences[0].step_mut(step).set_shape(CurveShape::Triangle);
    }
    project.track_mut(2).set_mode(TrackMode::MidiCv);
    project.clock_setup_mut().set_midi_tx(true);
    project
}

#[test]
fn update_loop_is_alloc_free() {
    let mut engine = Engine::new(SimHal::new(), busy_project());
    engine.init();
    engine.start();

    // warm up outside the guard
    for _ in 0..100 {
        engine.hal_mut().advance(1000);
        engine.update();
    }

    assert_no_alloc(|| {
        for ms in 0..5000u32 {
            if ms % 50 == 0 {
                engine
                    .hal_mut()
                    .midi_push(MidiPort::Midi, &[0x90, 60, 100, 0x80, 60, 0]);
            }
            if ms % 300 == 0 {
                engine
                    .project_mut()
                    .play_state_mut()
                    .request_mute(0, ms % 600 == 0, ExecuteType::Synced);
            }
            engine.hal_mut().advance(1000);
            engine.update();
        }
    });
}

#[test]
fn locked_update_is_alloc_free() {
    let mut engine = Engine::new(SimHal::new(), busy_project());
    engine.init();
    engine.start();
    for _ in 0..100 {
        engine.hal_mut().advance(1000);
        engine.update();
    }
    engine.lock();

    assert_no_alloc(|| {
        for _ in 0..1000 {
            engine.hal_mut().midi_push(MidiPort::Midi, &[0xf8, 0x90, 60, 100]);
            engine.hal_mut().advance(1000);
            engine.update();
        }
    });

    engine.unlock();
}
