//! The runtime interpreter's private PRNG, backing `Random`/`RandomInteger`
//! (spec §4.11). Parameterized by an optional seed so tests are
//! deterministic; `None` seeds from entropy.

use rand::{Rng as _, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A seeded PRNG wrapper. Each [`crate::interpreter::Interpreter`] owns
/// exactly one, matching the "private RNG" resource model of spec §5.
pub struct Rng {
    inner: ChaCha8Rng,
}

impl Rng {
    pub fn new(seed: Option<u64>) -> Self {
        let inner = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        Rng { inner }
    }

    /// `Random(lo, hi)`: a uniform float in `[lo, hi)`.
    pub fn random(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        self.inner.gen_range(lo..hi)
    }

    /// `RandomInteger(lo, hi)`: a uniform integer in `[lo, hi]` inclusive,
    /// truncated to `f64` (the engine has no distinct integer type).
    pub fn random_integer(&mut self, lo: i64, hi: i64) -> f64 {
        if hi <= lo {
            return lo as f64;
        }
        self.inner.gen_range(lo..=hi) as f64
    }
}
