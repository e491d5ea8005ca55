//! voltgrid simulator — runs the engine headless against simulated
//! hardware and reports gate/CV activity.
//!
//! Usage:
//!   voltgrid [--seconds N] [--bpm B] [--swing S]

use anyhow::Result;
use tracing::info;
use vg_engine::Engine;
use vg_hal::SimHal;
use vg_model::config::TRACK_COUNT;
use vg_model::{CurveShape, Project, TrackMode};

fn arg_value<T: std::str::FromStr>(args: &[String], name: &str, default: T) -> T {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// A small demo project: kick, offbeat hats, a triangle LFO.
fn demo_project(bpm: f32, swing: u8) -> Project {
    let mut project = Project::default();
    project.set_bpm(bpm);
    project.set_swing(swing);

    let kick = project.track_mut(0).note_mut().unwrap();
    for step in [0, 4, 8, 12] {
        kick.sequences[0].step_mut(step).set_gate(true);
    }

    let hats = project.track_mut(1).note_mut().unwrap();
    for step in [2, 6, 10, 14] {
        let s = hats.sequences[0].step_mut(step);
        s.set_gate(true);
        s.set_length(12);
        s.set_note(12);
    }

    project.track_mut(2).set_mode(TrackMode::Curve);
    let lfo = project.track_mut(2).curve_mut().unwrap();
    for step in 0..16 {
        lfo.sequences[0].step_mut(step).set_shape(CurveShape::Triangle);
    }

    project
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let seconds: u64 = arg_value(&args, "--seconds", 4);
    let bpm: f32 = arg_value(&args, "--bpm", 120.0);
    let swing: u8 = arg_value(&args, "--swing", 50);

    let mut engine = Engine::new(SimHal::new(), demo_project(bpm, swing));
    engine.init();

    info!(bpm, swing, seconds, "starting transport");
    engine.start();

    let mut gate_rises = [0u32; TRACK_COUNT];
    let mut previous_gates = 0u8;
    let mut cv_min = [f32::INFINITY; TRACK_COUNT];
    let mut cv_max = [f32::NEG_INFINITY; TRACK_COUNT];

    for _ in 0..seconds * 1000 {
        engine.hal_mut().advance(1000);
        engine.update();

        let gates = engine.hal().gates();
        let risen = gates & !previous_gates;
        previous_gates = gates;
        for (channel, count) in gate_rises.iter_mut().enumerate() {
            if risen & (1 << channel) != 0 {
                *count += 1;
            }
        }
        for channel in 0..TRACK_COUNT {
            let volts = engine.hal().cv(channel);
            cv_min[channel] = cv_min[channel].min(volts);
            cv_max[channel] = cv_max[channel].max(volts);
        }
    }

    engine.stop();
    info!(tick = engine.tick(), "transport stopped");

    println!();
    println!("channel  gate rises  cv min    cv max");
    for channel in 0..TRACK_COUNT {
        println!(
            "{:>7}  {:>10}  {:>7.3}V  {:>7.3}V",
            channel, gate_rises[channel], cv_min[channel], cv_max[channel]
        );
    }

    Ok(())
}
