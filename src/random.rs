//! Random perturbation source for Monte Carlo re-fits.
//!
//! One [`RandomNumberGenerator`] is shared by all Monte Carlo workers. Each
//! worker draws through its own [`RandomNumberBuffer`], which refills a block
//! of standard normal variates at a time so the shared generator's lock is
//! taken once per block instead of once per draw.

use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Default number of variates fetched per refill.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// A thread-safe source of standard normal variates.
pub trait RandomSource: Send + Sync {
    /// Overwrite `buffer` with independent draws from N(0, 1).
    fn fill_standard_normal(&self, buffer: &mut [f64]);
}

/// Shared, lock-protected standard normal generator.
#[derive(Debug)]
pub struct RandomNumberGenerator {
    rng: Mutex<StdRng>,
}

impl RandomNumberGenerator {
    /// Create a generator seeded from `seed`, or from system entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }
}

impl Default for RandomNumberGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RandomSource for RandomNumberGenerator {
    fn fill_standard_normal(&self, buffer: &mut [f64]) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        for value in buffer.iter_mut() {
            *value = rng.sample(StandardNormal);
        }
    }
}

/// Per-worker buffered view of a shared [`RandomSource`].
pub struct RandomNumberBuffer {
    source: Arc<dyn RandomSource>,
    buffer: Vec<f64>,
    position: usize,
}

impl RandomNumberBuffer {
    /// Create an empty buffer holding up to `size` variates (at least one).
    pub fn new(source: Arc<dyn RandomSource>, size: usize) -> Self {
        let size = size.max(1);
        Self {
            source,
            buffer: vec![0.0; size],
            position: size,
        }
    }

    /// Next standard normal variate, refilling from the source when empty.
    pub fn next_standard_normal(&mut self) -> f64 {
        if self.position == self.buffer.len() {
            self.source.fill_standard_normal(&mut self.buffer);
            self.position = 0;
        }
        let value = self.buffer[self.position];
        self.position += 1;
        value
    }
}
