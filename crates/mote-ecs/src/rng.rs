//! Seeded pseudo-random generator used for entity aliases and template
//! generators.
//!
//! Every [`World`](crate::world::World) owns one [`RandomGenerator`]. Seeding
//! it makes alias generation and every generator-driven component field
//! reproducible, which is what the determinism tests rely on. The generator
//! is not cryptographically secure.

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Characters entity aliases are drawn from.
pub const UID_ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Alias length used when none is configured.
pub const DEFAULT_UID_LENGTH: usize = 16;

/// Exclusive upper bound of [`RandomGenerator::random_int`].
pub const MAX_INT: i32 = i32::MAX;

#[derive(Debug, Clone)]
pub struct RandomGenerator {
    seed: u64,
    inner: Pcg32,
}

impl RandomGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            inner: Pcg32::seed_from_u64(seed),
        }
    }

    /// A generator seeded from the thread-local entropy source.
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// The seed this generator was (re)started from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the sequence from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    /// Uniform float in `[0, 1)`.
    pub fn random_float(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Uniform integer in `[0, MAX_INT)`.
    pub fn random_int(&mut self) -> i32 {
        self.inner.gen_range(0..MAX_INT)
    }

    /// Uniform integer in `[min, max)`; `min` when the range is empty.
    pub fn random_range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        self.inner.gen_range(min..max)
    }

    /// Uniform integer in `[0, max)`.
    pub fn random_range_to(&mut self, max: i64) -> i64 {
        self.random_range(0, max)
    }

    /// Uniform float in `[min, max)`; `min` when the range is empty.
    pub fn random_float_range(&mut self, min: f64, max: f64) -> f64 {
        if max.partial_cmp(&min) != Some(std::cmp::Ordering::Greater) {
            return min;
        }
        self.inner.gen_range(min..max)
    }

    /// Pick one element uniformly. `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, values: &'a [T]) -> Option<&'a T> {
        values.choose(&mut self.inner)
    }

    /// Pick one element with probability proportional to its weight.
    ///
    /// Falls back to a uniform pick when the weight count does not match the
    /// value count or the weights cannot form a distribution (negative, NaN,
    /// or all zero).
    pub fn choose_weighted<'a, T>(&mut self, values: &'a [T], weights: &[f64]) -> Option<&'a T> {
        if weights.len() == values.len() {
            if let Ok(dist) = WeightedIndex::new(weights) {
                return values.get(dist.sample(&mut self.inner));
            }
        }
        self.choose(values)
    }

    /// Fisher-Yates shuffle in place.
    pub fn shuffle<T>(&mut self, values: &mut [T]) {
        values.shuffle(&mut self.inner);
    }

    /// A `length`-character identifier drawn from a freshly shuffled
    /// [`UID_ALPHABET`].
    pub fn uid(&mut self, length: usize) -> String {
        let mut alphabet: Vec<char> = UID_ALPHABET.chars().collect();
        self.shuffle(&mut alphabet);
        let mut uid = String::with_capacity(length);
        while uid.len() < length {
            match self.choose(&alphabet) {
                Some(&c) => uid.push(c),
                None => break,
            }
        }
        uid
    }

    /// A point inside a circle of `radius` centred on the origin.
    ///
    /// The radial coordinate follows a triangular distribution, which makes
    /// the area density uniform.
    pub fn point_in_circle(&mut self, radius: f64, round: bool) -> (f64, f64) {
        let t = std::f64::consts::TAU * self.random_float();
        let u = self.random_float() + self.random_float();
        let r = if u > 1.0 { 2.0 - u } else { u };

        let (x, y) = (radius * r * t.cos(), radius * r * t.sin());
        if round {
            (x.round(), y.round())
        } else {
            (x, y)
        }
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
