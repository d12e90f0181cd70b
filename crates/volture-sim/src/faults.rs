//! ---
//! volture_section: "02-telemetry-simulation"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Probabilistic single-fault injection."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use crate::random::RandomSource;
use crate::snapshot::{BatterySnapshot, FaultCode, FaultEvent};

/// Attaches at most one randomly chosen fault to a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultInjector {
    probability: f64,
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self {
            probability: Self::DEFAULT_PROBABILITY,
        }
    }
}

impl FaultInjector {
    pub const DEFAULT_PROBABILITY: f64 = 0.05;

    /// `probability` is clamped into `[0, 1]`.
    pub fn new(probability: f64) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Replace the snapshot's fault list with either nothing or a single fault.
    pub fn maybe_inject(
        &self,
        mut snapshot: BatterySnapshot,
        rng: &mut dyn RandomSource,
    ) -> BatterySnapshot {
        snapshot.fault_flags.clear();
        if rng.unit() < self.probability {
            let code = FaultCode::ALL[rng.index(FaultCode::ALL.len())];
            snapshot.fault_flags.push(FaultEvent::new(code, snapshot.timestamp));
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;
    use chrono::Utc;

    struct FixedRoll {
        roll: f64,
        index: usize,
    }

    impl RandomSource for FixedRoll {
        fn uniform(&mut self, low: f64, _high: f64) -> f64 {
            low
        }

        fn unit(&mut self) -> f64 {
            self.roll
        }

        fn index(&mut self, _len: usize) -> usize {
            self.index
        }
    }

    fn seed() -> BatterySnapshot {
        BatterySnapshot::seed(Utc::now())
    }

    #[test]
    fn roll_above_probability_leaves_no_fault() {
        let injector = FaultInjector::default();
        let mut rng = FixedRoll {
            roll: 0.5,
            index: 0,
        };
        let snapshot = injector.maybe_inject(seed(), &mut rng);
        assert!(snapshot.fault_flags.is_empty());
    }

    #[test]
    fn roll_below_probability_attaches_table_entry() {
        let injector = FaultInjector::default();
        let mut rng = FixedRoll {
            roll: 0.01,
            index: 5,
        };
        let snapshot = injector.maybe_inject(seed(), &mut rng);
        assert_eq!(snapshot.fault_flags.len(), 1);
        let fault = &snapshot.fault_flags[0];
        assert_eq!(fault.code, 0x20);
        assert_eq!(fault.description, "SOC Low");
    }

    #[test]
    fn faults_are_not_cumulative() {
        let injector = FaultInjector::new(1.0);
        let mut rng = SeededRandom::seed_from_u64(9);
        let mut snapshot = seed();
        for _ in 0..50 {
            snapshot = injector.maybe_inject(snapshot, &mut rng);
            assert_eq!(snapshot.fault_flags.len(), 1);
        }
    }

    #[test]
    fn observed_frequency_matches_probability() {
        let injector = FaultInjector::default();
        let mut rng = SeededRandom::seed_from_u64(0x5EED);
        let trials = 100_000;
        let mut faulted = 0usize;
        let mut seen = crate::snapshot::FaultFlags::empty();
        for _ in 0..trials {
            let snapshot = injector.maybe_inject(seed(), &mut rng);
            assert!(snapshot.fault_flags.len() <= 1);
            if let Some(code) = snapshot.fault_flags.first().and_then(FaultEvent::fault_code) {
                faulted += 1;
                seen.insert(code);
            }
        }
        let frequency = faulted as f64 / trials as f64;
        // Standard error is ~0.0007 at this sample size.
        assert!((frequency - 0.05).abs() < 0.005, "frequency {frequency}");
        assert_eq!(seen.bits(), 0xFF);
    }

    #[test]
    fn probability_is_clamped() {
        assert_eq!(FaultInjector::new(4.0).probability(), 1.0);
        assert_eq!(FaultInjector::new(-1.0).probability(), 0.0);
    }
}
