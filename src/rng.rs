//! Deterministic random draws
//!
//! Every draw builds a fresh generator from `(seed, counter)` and then bumps
//! the counter, so a draw depends only on its position in the stream and not
//! on how much state previous draws consumed. Separate concerns (site
//! sampling, plate seeding, drift directions) get their own derived streams.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of repeatable scalar draws.
pub trait RandomSource {
    /// Integer in `[min, max)`; returns `min` when the range is empty.
    fn next_int(&mut self, min: i64, max: i64) -> i64;

    /// Float in `[min, max)`; returns `min` when the range is empty.
    fn next_float(&mut self, min: f64, max: f64) -> f64;
}

/// Counter-reseeded ChaCha8 stream.
#[derive(Clone, Debug)]
pub struct SeededRng {
    seed: u64,
    counter: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self { seed, counter: 0 }
    }

    /// Independent stream for a named concern.
    pub fn stream(&self, name: &str) -> Self {
        Self::new(derive_seed(self.seed, name))
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn fresh_generator(&mut self) -> ChaCha8Rng {
        let mixed = mix(self.seed, self.counter);
        self.counter += 1;
        ChaCha8Rng::seed_from_u64(mixed)
    }
}

impl RandomSource for SeededRng {
    fn next_int(&mut self, min: i64, max: i64) -> i64 {
        let mut rng = self.fresh_generator();
        if max <= min {
            return min;
        }
        rng.gen_range(min..max)
    }

    fn next_float(&mut self, min: f64, max: f64) -> f64 {
        let mut rng = self.fresh_generator();
        if max <= min {
            return min;
        }
        rng.gen_range(min..max)
    }
}

/// Derive a sub-seed from a master seed and a concern name.
fn derive_seed(master: u64, name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    master.hash(&mut hasher);
    name.hash(&mut hasher);
    hasher.finish()
}

/// SplitMix64 finaliser over seed and draw counter.
fn mix(seed: u64, counter: u64) -> u64 {
    let mut z = seed ^ counter.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
