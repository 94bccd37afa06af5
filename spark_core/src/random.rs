//! Uniform random draws for card drops.
//!
//! The drop resolver only ever asks for a float in `[0, 1)`, so sources are
//! easy to replace with a seeded or scripted one in tests.

use rand::rngs::{StdRng, ThreadRng};
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Supplies uniform draws in `[0, 1)`
pub trait RandomSource {
    fn next_f64(&mut self) -> f64;
}

/// Thread-local OS-seeded generator
#[derive(Clone, Debug, Default)]
pub struct ThreadRandom {
    rng: ThreadRng,
}

impl ThreadRandom {
    pub fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }
}

impl RandomSource for ThreadRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Reproducible generator for a given seed
#[derive(Clone, Debug)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed list of draws, cycling when exhausted
///
/// Values are clamped into `[0, 1)`.
#[derive(Clone, Debug)]
pub struct ScriptedRandom {
    draws: VecDeque<f64>,
}

impl ScriptedRandom {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        let mut draws: VecDeque<f64> = draws.into_iter().collect();
        if draws.is_empty() {
            draws.push_back(0.0);
        }
        Self { draws }
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&mut self) -> f64 {
        let value = self.draws.pop_front().unwrap_or(0.0);
        self.draws.push_back(value);
        value.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_f64(&mut self) -> f64 {
        (**self).next_f64()
    }
}
