//! Deterministic per-sample RNG streams for uncertainty simulation.
//!
//! A master seed is expanded into one sub-seed per simulated path via BLAKE3.
//! Each path draws a fixed number of values per forecast day, so the first
//! `h` days of a path are identical whatever horizon is requested.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

#[derive(Debug, Clone, Copy)]
pub struct SampleSeeds {
    master_seed: u64,
}

impl SampleSeeds {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    /// Sub-seed for simulated path `index`. Independent of derivation order.
    pub fn sub_seed(&self, index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(b"path");
        hasher.update(&index.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(index))
    }
}

pub fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    rng.sample(StandardNormal)
}

/// Linear-interpolated quantile of an ascending slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
        }
    }
}
