//! Pattern generators: euclidean, random and quick-random synthesis.
//!
//! Generators render into a normalized value pattern which is applied
//! to a sequence through the `SequenceBuilder` seam. A single
//! process-wide container owns at most one live generator at a time.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use vg_model::config::STEP_COUNT;
use vg_model::{CurveSequence, NoteSequence};

/// Metadata describing a generator parameter.
pub struct ParamInfo {
    pub name: &'static str,
    pub min: i32,
    pub max: i32,
    pub default: i32,
}

/// Receives normalized values from a generator.
pub trait SequenceBuilder {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a normalized value (0..1) into step `index`.
    fn set_value(&mut self, index: usize, value: f32);
}

impl SequenceBuilder for NoteSequence {
    fn len(&self) -> usize {
        STEP_COUNT
    }

    fn set_value(&mut self, index: usize, value: f32) {
        let step = self.step_mut(index);
        step.set_gate(value >= 0.5);
        step.set_note((value * 24.0) as i8 - 12);
    }
}

impl SequenceBuilder for CurveSequence {
    fn len(&self) -> usize {
        STEP_COUNT
    }

    fn set_value(&mut self, index: usize, value: f32) {
        self.step_mut(index).set_max((value * 255.0) as u8);
    }
}

/// Generator flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorMode {
    Euclidean,
    Random,
    QuickRandom,
}

/// Values a generator renders, 0..255 per step.
pub type GeneratorPattern = [u8; STEP_COUNT];

// --- euclidean ---

static EUCLIDEAN_PARAMS: &[ParamInfo] = &[
    ParamInfo { name: "Steps", min: 1, max: STEP_COUNT as i32, default: 16 },
    ParamInfo { name: "Pulses", min: 0, max: STEP_COUNT as i32, default: 4 },
    ParamInfo { name: "Rotate", min: 0, max: STEP_COUNT as i32 - 1, default: 0 },
];

/// Evenly distributes `pulses` over `steps` with the bucket method.
pub struct EuclideanGenerator {
    steps: u8,
    pulses: u8,
    rotate: u8,
    pattern: GeneratorPattern,
}

impl EuclideanGenerator {
    pub fn new() -> Self {
        let mut generator = Self { steps: 16, pulses: 4, rotate: 0, pattern: [0; STEP_COUNT] };
        generator.update();
        generator
    }

    pub fn set_steps(&mut self, steps: i32) {
        self.steps = steps.clamp(1, STEP_COUNT as i32) as u8;
    }

    pub fn set_pulses(&mut self, pulses: i32) {
        self.pulses = pulses.clamp(0, STEP_COUNT as i32) as u8;
    }

    pub fn set_rotate(&mut self, rotate: i32) {
        self.rotate = rotate.rem_euclid(self.steps.max(1) as i32) as u8;
    }

    pub fn update(&mut self) {
        let steps = self.steps.max(1) as u32;
        let pulses = self.pulses.min(self.steps) as u32;
        self.pattern = [0; STEP_COUNT];
        for i in 0..steps {
            let position = (i + steps - self.rotate as u32 % steps) % steps;
            let on = pulses > 0 && (position * pulses) % steps < pulses;
            self.pattern[i as usize] = if on { 255 } else { 0 };
        }
    }
}

impl Default for EuclideanGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// --- random ---

static RANDOM_PARAMS: &[ParamInfo] = &[
    ParamInfo { name: "Seed", min: 0, max: 1000, default: 0 },
    ParamInfo { name: "Smooth", min: 0, max: 10, default: 0 },
    ParamInfo { name: "Bias", min: -10, max: 10, default: 0 },
    ParamInfo { name: "Scale", min: 0, max: 100, default: 10 },
];

/// Seeded random values with neighbor smoothing, bias and scale.
pub struct RandomGenerator {
    seed: u16,
    smooth: u8,
    bias: i8,
    scale: u8,
    pattern: GeneratorPattern,
}

impl RandomGenerator {
    pub fn new() -> Self {
        let mut generator =
            Self { seed: 0, smooth: 0, bias: 0, scale: 10, pattern: [0; STEP_COUNT] };
        generator.update();
        generator
    }

    pub fn set_seed(&mut self, seed: i32) {
        self.seed = seed.clamp(0, 1000) as u16;
    }

    pub fn set_smooth(&mut self, smooth: i32) {
        self.smooth = smooth.clamp(0, 10) as u8;
    }

    pub fn set_bias(&mut self, bias: i32) {
        self.bias = bias.clamp(-10, 10) as i8;
    }

    pub fn set_scale(&mut self, scale: i32) {
        self.scale = scale.clamp(0, 100) as u8;
    }

    /// Fill with seeded noise and run the smoothing passes.
    fn fill_smoothed(seed: u16, smooth: u8, pattern: &mut GeneratorPattern) {
        let mut rng = SmallRng::seed_from_u64(seed as u64);
        for value in pattern.iter_mut() {
            *value = rng.gen_range(0..=255u32) as u8;
        }
        let size = pattern.len() as i32;
        for _ in 0..smooth {
            for i in 0..pattern.len() {
                let prev = pattern[((i as i32 - 1 + size) % size) as usize] as i32;
                let next = pattern[((i as i32 + 1) % size) as usize] as i32;
                pattern[i] = ((4 * pattern[i] as i32 + prev + next + 3) / 6) as u8;
            }
        }
    }

    pub fn update(&mut self) {
        Self::fill_smoothed(self.seed, self.smooth, &mut self.pattern);
        let bias = self.bias as i32 * 255 / 10;
        let scale = self.scale as i32;
        for value in self.pattern.iter_mut() {
            let scaled = ((*value as i32 - 127) * scale) / 10 + 127 + bias;
            *value = scaled.clamp(0, 255) as u8;
        }
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// --- quick random ---

static QUICK_RANDOM_PARAMS: &[ParamInfo] = &[
    ParamInfo { name: "Sparse", min: 0, max: 1000, default: 0 },
    ParamInfo { name: "Smooth", min: 0, max: 10, default: 0 },
    ParamInfo { name: "Bias", min: -10, max: 10, default: 0 },
    ParamInfo { name: "Beats", min: 0, max: 100, default: 10 },
];

/// Seeds below this select probabilistic gates with density = seed.
const SPARSE_SEED_LIMIT: u16 = 25;
/// Seed selecting the preset beat table; regenerating cycles the table.
const PRESET_BEAT_SEED: u16 = 25;
/// Seed selecting random notes in a three-octave band.
const RANDOM_NOTE_SEED: u16 = 26;
/// Pattern value that reads as a gate-on step.
const GATE_ON_VALUE: u8 = 200;
/// Bottom of the random-note band (cuts off the low octaves).
const NOTE_BAND_FLOOR: u8 = 80;

const PRESET_BEATS: [[u8; 16]; 12] = [
    [1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0],
    [0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0],
    [0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0],
    [0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 0, 1, 0],
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    [1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0],
    [0, 0, 0, 0, 1, 0, 1, 0, 0, 0, 0, 0, 1, 0, 0, 0],
    [0, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 1, 1, 0, 0],
    [1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 0, 1, 0],
    [0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0],
    [1, 0, 1, 0, 0, 0, 0, 0, 1, 0, 1, 0, 0, 0, 0, 0],
];

/// Exploratory generator with three seed-selected modes: sparse
/// probabilistic gates, a preset beat table, and random notes. The
/// seed thresholds are kept for compatibility with existing projects.
pub struct QuickRandomGenerator {
    seed: u16,
    smooth: u8,
    bias: i8,
    scale: u8,
    current_beat: usize,
    pattern: GeneratorPattern,
}

impl QuickRandomGenerator {
    pub fn new() -> Self {
        let mut generator = Self {
            seed: 0,
            smooth: 0,
            bias: 0,
            scale: 10,
            current_beat: 0,
            pattern: [0; STEP_COUNT],
        };
        generator.update();
        generator
    }

    pub fn set_seed(&mut self, seed: i32) {
        self.seed = seed.clamp(0, 1000) as u16;
    }

    pub fn set_smooth(&mut self, smooth: i32) {
        self.smooth = smooth.clamp(0, 10) as u8;
    }

    pub fn set_bias(&mut self, bias: i32) {
        self.bias = bias.clamp(-10, 10) as i8;
    }

    pub fn set_scale(&mut self, scale: i32) {
        self.scale = scale.clamp(0, 100) as u8;
    }

    pub fn current_beat(&self) -> usize {
        self.current_beat
    }

    pub fn update(&mut self) {
        RandomGenerator::fill_smoothed(self.seed, self.smooth, &mut self.pattern);
        let mut rng = SmallRng::seed_from_u64((self.seed as u64) << 16 | self.current_beat as u64);

        if self.current_beat >= PRESET_BEATS.len() {
            self.current_beat = 0;
        }

        for i in 0..self.pattern.len() {
            if self.seed < SPARSE_SEED_LIMIT {
                let complexity = rng.gen_range(0..16u16);
                self.pattern[i] = if complexity <= self.seed { GATE_ON_VALUE } else { 0 };
            }
            if self.seed == PRESET_BEAT_SEED {
                let beat = PRESET_BEATS[self.current_beat][i % 16];
                self.pattern[i] = if beat == 1 { GATE_ON_VALUE } else { 0 };
            }
            if self.seed == RANDOM_NOTE_SEED {
                // notes in a three octave band above the floor
                self.pattern[i] = NOTE_BAND_FLOOR + rng.gen_range(0..128u32) as u8;
            }
        }

        if self.seed == PRESET_BEAT_SEED {
            self.current_beat += 1;
        }
    }
}

impl Default for QuickRandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// --- dispatch ---

/// A live generator; the variant is chosen at acquire time.
pub enum Generator {
    Euclidean(EuclideanGenerator),
    Random(RandomGenerator),
    QuickRandom(QuickRandomGenerator),
}

impl Generator {
    pub fn new(mode: GeneratorMode) -> Self {
        match mode {
            GeneratorMode::Euclidean => Generator::Euclidean(EuclideanGenerator::new()),
            GeneratorMode::Random => Generator::Random(RandomGenerator::new()),
            GeneratorMode::QuickRandom => Generator::QuickRandom(QuickRandomGenerator::new()),
        }
    }

    pub fn mode(&self) -> GeneratorMode {
        match self {
            Generator::Euclidean(_) => GeneratorMode::Euclidean,
            Generator::Random(_) => GeneratorMode::Random,
            Generator::QuickRandom(_) => GeneratorMode::QuickRandom,
        }
    }

    pub fn params(&self) -> &'static [ParamInfo] {
        match self {
            Generator::Euclidean(_) => EUCLIDEAN_PARAMS,
            Generator::Random(_) => RANDOM_PARAMS,
            Generator::QuickRandom(_) => QUICK_RANDOM_PARAMS,
        }
    }

    /// Nudge a parameter by `delta` and regenerate.
    pub fn edit_param(&mut self, index: usize, delta: i32) {
        match self {
            Generator::Euclidean(g) => match index {
                0 => g.set_steps(g.steps as i32 + delta),
                1 => g.set_pulses(g.pulses as i32 + delta),
                2 => g.set_rotate(g.rotate as i32 + delta),
                _ => {}
            },
            Generator::Random(g) => match index {
                0 => g.set_seed(g.seed as i32 + delta),
                1 => g.set_smooth(g.smooth as i32 + delta),
                2 => g.set_bias(g.bias as i32 + delta),
                3 => g.set_scale(g.scale as i32 + delta),
                _ => {}
            },
            Generator::QuickRandom(g) => match index {
                0 => g.set_seed(g.seed as i32 + delta),
                1 => g.set_smooth(g.smooth as i32 + delta),
                2 => g.set_bias(g.bias as i32 + delta),
                3 => g.set_scale(g.scale as i32 + delta),
                _ => {}
            },
        }
        self.update();
    }

    pub fn update(&mut self) {
        match self {
            Generator::Euclidean(g) => g.update(),
            Generator::Random(g) => g.update(),
            Generator::QuickRandom(g) => g.update(),
        }
    }

    pub fn pattern(&self) -> &GeneratorPattern {
        match self {
            Generator::Euclidean(g) => &g.pattern,
            Generator::Random(g) => &g.pattern,
            Generator::QuickRandom(g) => &g.pattern,
        }
    }

    /// Write the rendered pattern into a sequence.
    pub fn apply(&self, builder: &mut dyn SequenceBuilder) {
        let len = builder.len().min(STEP_COUNT);
        for (i, &value) in self.pattern().iter().take(len).enumerate() {
            builder.set_value(i, value as f32 / 255.0);
        }
    }
}

/// Process-wide storage for the single live generator.
#[derive(Default)]
pub struct GeneratorContainer {
    active: Option<Generator>,
}

impl GeneratorContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring up a generator; fails while another one is live.
    pub fn acquire(&mut self, mode: GeneratorMode) -> Option<&mut Generator> {
        if self.active.is_some() {
            return None;
        }
        self.active = Some(Generator::new(mode));
        self.active.as_mut()
    }

    pub fn active_mut(&mut self) -> Option<&mut Generator> {
        self.active.as_mut()
    }

    pub fn is_live(&self) -> bool {
        self.active.is_some()
    }

    /// Tear down the live generator.
    pub fn release(&mut self) {
        self.active = None;
    }
}
