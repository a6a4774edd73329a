//! Random selection of the quadrant to fetch next.
//!
//! Always requesting the same quadrant first would let a peer withhold exactly that quadrant
//! from every verifier. Each [Sampler] owns its generator, so concurrent retrievals never
//! contend on shared randomness.

use crate::square::Quadrant;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

/// Picks quadrants uniformly at random among those not yet excluded.
pub struct Sampler<R: Rng = StdRng> {
    rng: R,
}

impl Sampler<StdRng> {
    /// Create a sampler with a freshly seeded generator.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Create a sampler with a deterministic generator.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Sampler<R> {
    /// Create a sampler drawing from `rng`.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Pick a quadrant not in `excluded`, or `None` if every quadrant is excluded.
    pub fn pick(&mut self, excluded: &[Quadrant]) -> Option<Quadrant> {
        let candidates: Vec<Quadrant> = Quadrant::ALL
            .into_iter()
            .filter(|quadrant| !excluded.contains(quadrant))
            .collect();
        candidates.choose(&mut self.rng).copied()
    }
}
