//! ---
//! volture_section: "02-telemetry-simulation"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Random source abstraction for reproducible synthesis."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use rand::prelude::*;

/// Source of randomness consumed by the synthesizer, fault injector and history
/// generator. Tests substitute fixed sources to pin the output.
pub trait RandomSource: Send {
    /// Uniform sample in `[low, high]`.
    fn uniform(&mut self, low: f64, high: f64) -> f64;

    /// Uniform sample in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn index(&mut self, len: usize) -> usize;
}

/// [`RandomSource`] backed by a seedable [`StdRng`].
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn seed_from_u64(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl RandomSource for SeededRandom {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..=high)
    }

    fn unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SeededRandom::seed_from_u64(11);
        let mut b = SeededRandom::seed_from_u64(11);
        for _ in 0..32 {
            assert_eq!(a.uniform(-1.0, 1.0), b.uniform(-1.0, 1.0));
            assert_eq!(a.index(8), b.index(8));
        }
    }

    #[test]
    fn samples_stay_in_range() {
        let mut rng = SeededRandom::seed_from_u64(3);
        for _ in 0..1000 {
            let value = rng.uniform(-0.2, 0.2);
            assert!((-0.2..=0.2).contains(&value));
            let unit = rng.unit();
            assert!((0.0..1.0).contains(&unit));
            assert!(rng.index(8) < 8);
        }
        assert_eq!(rng.uniform(5.0, 5.0), 5.0);
    }
}
