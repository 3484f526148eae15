use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

use crate::Float;

/// A stream of uniform random numbers.
///
/// Every worker thread renders with its own replica of one stream, so code consuming draws
/// must do so a fixed number of times on every branch; [`Sampler`] helps with that.
pub trait Random: Send + Sync {
    /// Uniform value in `[0, 1)`.
    fn next_float(&mut self) -> Float;

    /// Uniform index in `[0, n)`. Consumes exactly one draw.
    fn next_index(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        let idx = (self.next_float() * n as Float) as usize;
        idx.min(n - 1)
    }

    fn discard(&mut self, n: usize) {
        for _ in 0..n {
            self.next_float();
        }
    }

    /// An independent copy positioned at the same point in the stream.
    fn replicate(&self) -> Box<dyn Random>;

    /// Restarts at the beginning of sub-stream `stream` of this generator's seed. The same
    /// seed and stream always give the same sequence, whichever thread asks for it.
    fn set_stream(&mut self, stream: u64);
}

#[derive(Clone)]
pub struct XoshiroRandom {
    seed: u64,
    rng: Xoshiro256Plus,
}

impl XoshiroRandom {
    pub fn new_with_seed(seed: u64) -> Self {
        Self { seed, rng: Xoshiro256Plus::seed_from_u64(seed) }
    }
}

impl Random for XoshiroRandom {
    fn next_float(&mut self) -> Float {
        self.rng.gen()
    }

    fn replicate(&self) -> Box<dyn Random> {
        Box::new(self.clone())
    }

    fn set_stream(&mut self, stream: u64) {
        // seed_from_u64 runs the key through SplitMix64, so neighbouring keys decorrelate
        let key = self.seed ^ stream.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        self.rng = Xoshiro256Plus::seed_from_u64(key);
    }
}

/// Borrows a [`Random`] for one scattering or light-sampling operation that is allowed a fixed
/// number of draws. Draws that were budgeted but not used are discarded when the sampler is
/// dropped, so the stream position afterwards does not depend on the branch taken.
pub struct Sampler<'r> {
    rng: &'r mut dyn Random,
    remaining: usize,
}

impl<'r> Sampler<'r> {
    pub fn new(rng: &'r mut dyn Random, budget: usize) -> Self {
        Self { rng, remaining: budget }
    }

    pub fn next(&mut self) -> Float {
        self.remaining = self.remaining.saturating_sub(1);
        self.rng.next_float()
    }

    pub fn next_index(&mut self, n: usize) -> usize {
        self.remaining = self.remaining.saturating_sub(1);
        self.rng.next_index(n)
    }
}

impl Drop for Sampler<'_> {
    fn drop(&mut self) {
        self.rng.discard(self.remaining);
    }
}
