//! Random sources for dice
//!
//! Every roll in the engine draws from a `RandomSource` yielding values in
//! [0, 1). Production code uses the thread rng or a seeded `StdRng`; tests
//! script exact die faces with `ScriptedRandom`.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniformly distributed values in [0, 1)
pub trait RandomSource: Send {
    /// Draw the next value in [0, 1)
    fn next_unit(&mut self) -> f64;
}

impl<F> RandomSource for F
where
    F: FnMut() -> f64 + Send,
{
    fn next_unit(&mut self) -> f64 {
        self()
    }
}

/// Thread-local entropy, the default for live play
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&mut self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Reproducible stream from a fixed seed
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    /// Create a seeded source
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// Replays a fixed sequence of values, then a fallback forever.
///
/// Use [`ScriptedRandom::faces`] to script die faces directly:
/// `faces(&[(15, 20), (6, 8)])` makes the next d20 show 15 and the d8 after
/// it show 6.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedRandom {
    /// Replay `values`, then 0.5 once exhausted
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
            fallback: 0.5,
        }
    }

    /// Replay the given `(face, sides)` pairs
    pub fn faces(faces: &[(u32, u32)]) -> Self {
        Self::new(faces.iter().map(|&(face, sides)| face_value(face, sides)))
    }

    /// Set the value returned once the script runs out
    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }

    /// Number of scripted values not yet consumed
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        self.values.pop_front().unwrap_or(self.fallback)
    }
}

/// The unit value that makes a die with `sides` show `face`
pub fn face_value(face: u32, sides: u32) -> f64 {
    let sides = sides.max(1);
    let face = face.clamp(1, sides);
    (face as f64 - 0.5) / sides as f64
}
