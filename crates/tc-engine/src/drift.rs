//! Slow per-voice pitch drift.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Fixed per-voice offsets, scaled by [`DRIFT_CONSTANT_AMOUNT`].
pub const DRIFT_TABLE: [f32; 16] = [
    0.465, 0.005, 0.013, 0.019, 0.155, 0.933, 0.002, 0.024, 0.943, 0.924, 0.139, 0.501, 0.196,
    0.591, 0.961, 0.442,
];

pub const DRIFT_CONSTANT_AMOUNT: f32 = 0.004;
pub const DRIFT_RANDOM_AMOUNT: f32 = 0.002;

/// Seconds between drift targets. Also the drift glide time.
pub const DRIFT_INTERVAL_SECONDS: f32 = 10.0;

const DRIFT_SEED: u64 = 0x7461_6374;

/// Clock and random source for drift targets.
pub struct Drift {
    rng: SmallRng,
    /// Samples since the last targets. `None` until the first buffer.
    counter: Option<u64>,
    interval: u64,
}

impl Drift {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(DRIFT_SEED),
            counter: None,
            interval: interval_samples(sample_rate),
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.interval = interval_samples(sample_rate);
    }

    /// Start over: the next `advance` fires.
    pub fn reset(&mut self) {
        self.counter = None;
    }

    /// Count `frames` samples. Returns true when new targets are due,
    /// which is on the first call and then once per interval.
    pub fn advance(&mut self, frames: usize) -> bool {
        let due = match self.counter {
            None => true,
            Some(c) => c > self.interval,
        };
        let base = if due { 0 } else { self.counter.unwrap_or(0) };
        self.counter = Some(base + frames as u64);
        due
    }

    /// Next drift target for `voice`, in octaves, before scaling by the
    /// configured amount.
    pub fn target(&mut self, voice: usize) -> f32 {
        let constant = DRIFT_TABLE[voice % DRIFT_TABLE.len()] * DRIFT_CONSTANT_AMOUNT;
        let random: f32 = self.rng.gen_range(-1.0..1.0);
        constant + random * DRIFT_RANDOM_AMOUNT
    }
}

fn interval_samples(sample_rate: f32) -> u64 {
    (sample_rate * DRIFT_INTERVAL_SECONDS) as u64
}
