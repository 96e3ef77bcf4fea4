//! Fast PRNG for probe parameter sampling. Uses SplitMix64.
//! Deterministic: same seed produces the same sequence. Not cryptographically secure.

use std::time::{SystemTime, UNIX_EPOCH};

const GOLDEN_GAMMA: u64 = 0x9e3779b97f4a7c15;

/// 2^53 - 1: largest value whose ratio to itself is exactly 1.0 in f64.
const UNIT_SCALE: f64 = ((1u64 << 53) - 1) as f64;

/// SplitMix64 finalizer.
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Sampling stream of one dataset.
#[derive(Debug, Clone, Copy)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        mix(self.state)
    }

    /// Uniform float in `[0, 1]`, both ends reachable.
    pub fn next_unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / UNIT_SCALE
    }

    /// Uniform float in `[lo, hi]`.
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_unit()
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        (self.next_u64() % len as u64) as usize
    }
}

/// Seed from the OS; falls back to the wall clock when the OS source is unavailable.
pub fn entropy_seed() -> u64 {
    let mut buf = [0u8; 8];
    match getrandom::getrandom(&mut buf) {
        Ok(()) => u64::from_le_bytes(buf),
        Err(err) => {
            tracing::warn!(%err, "OS entropy unavailable, seeding from clock");
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(GOLDEN_GAMMA)
        }
    }
}

/// Per-dataset seed so sampled parameters do not depend on worker scheduling.
///
/// Every byte of `key` passes through the finalizer, so ids differing in one late character
/// still get unrelated streams.
pub fn stable_seed(seed: u64, key: &str) -> u64 {
    key.bytes().fold(mix(seed), |acc, b| {
        mix(acc.wrapping_add(GOLDEN_GAMMA) ^ u64::from(b))
    })
}
