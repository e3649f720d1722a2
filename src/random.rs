//! Injectable randomness for the scorer and the sequencer.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform floats in `[0, 1)`.
pub trait RandomSource {
    fn float(&mut self) -> f64;

    /// Uniform index into a collection of `len` items. `len` must be non-zero.
    fn pick_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0, "pick_index on an empty pool");
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let index = (self.float() * len as f64).floor() as usize;
        index.min(len.saturating_sub(1))
    }
}

/// Reproducible source for tests, benchmarks and `--seed` runs.
#[derive(Debug, Clone)]
pub struct SeededRandom(StdRng);

impl SeededRandom {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn float(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Production source backed by the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn float(&mut self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Builds the source for a run: seeded when a seed is given.
#[must_use]
pub fn source_for(seed: Option<u64>) -> Box<dyn RandomSource> {
    match seed {
        Some(seed) => Box::new(SeededRandom::new(seed)),
        None => Box::new(ThreadRandom),
    }
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn float(&mut self) -> f64 {
        (**self).float()
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn float(&mut self) -> f64 {
        (**self).float()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::RandomSource;

    /// Always returns the same value.
    pub struct Constant(pub f64);

    impl RandomSource for Constant {
        fn float(&mut self) -> f64 {
            self.0
        }
    }
}
