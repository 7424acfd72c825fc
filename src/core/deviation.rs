//! Sources of per-month inflation noise.
//!
//! Every source returns a value in `[-variation, +variation]`. The engine
//! takes one by value at construction so tests can pin the sequence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait DeviationSource {
    fn next_deviation(&mut self, variation: f64) -> f64;
}

impl<F> DeviationSource for F
where
    F: FnMut(f64) -> f64,
{
    fn next_deviation(&mut self, variation: f64) -> f64 {
        self(variation)
    }
}

/// Production default, seeded from OS entropy.
#[derive(Debug)]
pub struct EntropyDeviation {
    rng: StdRng,
}

impl EntropyDeviation {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for EntropyDeviation {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviationSource for EntropyDeviation {
    fn next_deviation(&mut self, variation: f64) -> f64 {
        let unit: f64 = self.rng.gen_range(-1.0..=1.0);
        unit * variation
    }
}

/// Reproducible xorshift source.
#[derive(Debug, Clone)]
pub struct SeededDeviation {
    state: u64,
}

impl SeededDeviation {
    pub fn new(seed: u64) -> Self {
        let state = splitmix64(seed);
        let state = if state == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            state
        };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform in `[0, 1]`.
    fn next_unit(&mut self) -> f64 {
        const DENOM: f64 = ((1_u64 << 53) - 1) as f64;
        (self.next_u64() >> 11) as f64 / DENOM
    }
}

impl DeviationSource for SeededDeviation {
    fn next_deviation(&mut self, variation: f64) -> f64 {
        (self.next_unit() * 2.0 - 1.0) * variation
    }
}

/// Replays unit draws in `[-1, 1]`, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct FixedDeviations {
    units: Vec<f64>,
    cursor: usize,
}

impl FixedDeviations {
    pub fn new(units: Vec<f64>) -> Self {
        Self { units, cursor: 0 }
    }
}

impl DeviationSource for FixedDeviations {
    fn next_deviation(&mut self, variation: f64) -> f64 {
        if self.units.is_empty() {
            return 0.0;
        }
        let unit = self.units[self.cursor % self.units.len()];
        self.cursor = (self.cursor + 1) % self.units.len();
        unit * variation
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDeviation;

impl DeviationSource for NoDeviation {
    fn next_deviation(&mut self, _variation: f64) -> f64 {
        0.0
    }
}

/// Per-stream seed; [`SeededDeviation::new`] does the scrambling.
pub(crate) fn derive_seed(base_seed: u64, stream: u32) -> u64 {
    base_seed ^ ((stream as u64) << 32)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{any, prop_assert, proptest};

    #[test]
    fn seeded_sources_with_same_seed_agree() {
        let mut a = SeededDeviation::new(42);
        let mut b = SeededDeviation::new(42);
        for _ in 0..256 {
            assert_eq!(
                a.next_deviation(0.005).to_bits(),
                b.next_deviation(0.005).to_bits()
            );
        }
    }

    #[test]
    fn seeded_sources_with_different_seeds_diverge() {
        let mut a = SeededDeviation::new(1);
        let mut b = SeededDeviation::new(2);
        let same = (0..32).all(|_| a.next_deviation(1.0) == b.next_deviation(1.0));
        assert!(!same);
    }

    #[test]
    fn zero_variation_yields_zero_for_every_source() {
        let mut seeded = SeededDeviation::new(9);
        let mut entropy = EntropyDeviation::new();
        let mut fixed = FixedDeviations::new(vec![1.0, -1.0, 0.3]);
        for _ in 0..16 {
            assert_eq!(seeded.next_deviation(0.0), 0.0);
            assert_eq!(entropy.next_deviation(0.0), 0.0);
            assert_eq!(fixed.next_deviation(0.0), 0.0);
            assert_eq!(NoDeviation.next_deviation(0.0), 0.0);
        }
    }

    #[test]
    fn fixed_deviations_cycle_and_scale() {
        let mut fixed = FixedDeviations::new(vec![1.0, -0.5]);
        assert_eq!(fixed.next_deviation(0.01), 0.01);
        assert_eq!(fixed.next_deviation(0.01), -0.005);
        assert_eq!(fixed.next_deviation(0.01), 0.01);
    }

    #[test]
    fn empty_fixed_sequence_yields_zero() {
        let mut fixed = FixedDeviations::new(Vec::new());
        assert_eq!(fixed.next_deviation(0.5), 0.0);
    }

    #[test]
    fn closures_are_deviation_sources() {
        let mut calls = 0;
        let mut source = |variation: f64| {
            calls += 1;
            variation / 2.0
        };
        assert_eq!(source.next_deviation(0.02), 0.01);
        assert_eq!(calls, 1);
    }

    #[test]
    fn derive_seed_changes_per_stream() {
        assert_ne!(derive_seed(7, 0), derive_seed(7, 1));
        assert_ne!(derive_seed(7, 0), derive_seed(8, 0));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_seeded_deviation_stays_within_bounds(
            seed in any::<u64>(),
            variation_bp in 0u32..2_000
        ) {
            let variation = variation_bp as f64 / 10_000.0;
            let mut source = SeededDeviation::new(seed);
            for _ in 0..64 {
                let d = source.next_deviation(variation);
                prop_assert!(d >= -variation && d <= variation);
            }
        }

        #[test]
        fn prop_entropy_deviation_stays_within_bounds(variation_bp in 0u32..2_000) {
            let variation = variation_bp as f64 / 10_000.0;
            let mut source = EntropyDeviation::new();
            for _ in 0..64 {
                let d = source.next_deviation(variation);
                prop_assert!(d >= -variation && d <= variation);
            }
        }
    }
}
