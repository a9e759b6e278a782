use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::error::{FixtureError, Result};
use crate::tensor::{checked_numel, Tensor};

/// Seeded random source shared by every draw of one fixture.
///
/// Draws are consumed in call order, so the same seed and the same sequence
/// of calls always produce the same tensors. The generator is ChaCha8 rather
/// than `StdRng`, whose algorithm may change between `rand` releases.
#[derive(Debug, Clone)]
pub struct FixtureRng {
    rng: ChaCha8Rng,
    seed: u64,
}

impl FixtureRng {
    pub fn seed_from_u64(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Tensor of standard normal samples.
    pub fn randn(&mut self, shape: &[usize]) -> Result<Tensor> {
        let numel = checked_numel(shape, "fixture_rng.randn")?;
        let mut values = Vec::with_capacity(numel);
        for _ in 0..numel {
            values.push(self.rng.sample::<f32, _>(StandardNormal));
        }
        Tensor::try_from_vec_f32(values, shape)
    }

    /// Tensor of samples from `U(-bound, bound)`.
    pub fn uniform(&mut self, shape: &[usize], bound: f32) -> Result<Tensor> {
        if !bound.is_finite() || bound <= 0.0 {
            return Err(FixtureError::InvalidArgument {
                op: "fixture_rng.uniform",
                msg: format!("bound must be finite and > 0, got {bound}"),
            });
        }
        let numel = checked_numel(shape, "fixture_rng.uniform")?;
        let mut values = Vec::with_capacity(numel);
        for _ in 0..numel {
            values.push(self.rng.gen_range(-bound..bound));
        }
        Tensor::try_from_vec_f32(values, shape)
    }
}
