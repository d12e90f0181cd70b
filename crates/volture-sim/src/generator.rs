//! ---
//! volture_section: "02-telemetry-simulation"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Bounded random-walk battery reading synthesizer."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use std::fmt;

use chrono::Utc;
use strum::IntoEnumIterator;

use crate::random::{RandomSource, SeededRandom};
use crate::snapshot::{BatterySnapshot, FaultEvent, Parameter};

/// Symmetric step and clamp range for one field of the random walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldWalk {
    pub step: f64,
    pub min: f64,
    pub max: f64,
}

impl FieldWalk {
    pub const fn new(step: f64, min: f64, max: f64) -> Self {
        Self { step, min, max }
    }

    pub fn apply(&self, value: f64, rng: &mut dyn RandomSource) -> f64 {
        let delta = rng.uniform(-self.step, self.step);
        (value + delta).clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Generation clamp ranges. These are physical bounds, not alert thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkProfile {
    pub voltage: FieldWalk,
    pub current: FieldWalk,
    pub temperature: FieldWalk,
    pub soc: FieldWalk,
    pub soh: FieldWalk,
}

impl Default for WalkProfile {
    fn default() -> Self {
        Self {
            voltage: FieldWalk::new(0.2, 42.0, 54.0),
            current: FieldWalk::new(1.0, -20.0, 20.0),
            temperature: FieldWalk::new(0.5, 15.0, 45.0),
            soc: FieldWalk::new(0.5, 0.0, 100.0),
            soh: FieldWalk::new(0.1, 70.0, 100.0),
        }
    }
}

impl WalkProfile {
    pub fn field(&self, parameter: Parameter) -> FieldWalk {
        match parameter {
            Parameter::Voltage => self.voltage,
            Parameter::Current => self.current,
            Parameter::Temperature => self.temperature,
            Parameter::Soc => self.soc,
            Parameter::Soh => self.soh,
        }
    }
}

/// Owns the live battery reading and advances it one tick at a time.
pub struct ReadingSynthesizer {
    current: BatterySnapshot,
    profile: WalkProfile,
    rng: Box<dyn RandomSource>,
}

impl fmt::Debug for ReadingSynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadingSynthesizer")
            .field("current", &self.current)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl ReadingSynthesizer {
    /// Start from the seed state using the supplied random source.
    pub fn new(rng: Box<dyn RandomSource>) -> Self {
        Self {
            current: BatterySnapshot::seed(Utc::now()),
            profile: WalkProfile::default(),
            rng,
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Box::new(SeededRandom::seed_from_u64(seed)))
    }

    pub fn profile(&self) -> &WalkProfile {
        &self.profile
    }

    pub fn current(&self) -> &BatterySnapshot {
        &self.current
    }

    /// Walk every field by a bounded delta, clear this tick's faults and stamp the
    /// reading with the current time.
    pub fn advance(&mut self) -> BatterySnapshot {
        for parameter in Parameter::iter() {
            let walk = self.profile.field(parameter);
            let value = self.current.value_mut(parameter);
            *value = walk.apply(*value, self.rng.as_mut());
        }
        self.current.fault_flags.clear();
        self.current.timestamp = Utc::now();
        self.current.clone()
    }

    pub fn rng_mut(&mut self) -> &mut dyn RandomSource {
        self.rng.as_mut()
    }

    pub(crate) fn set_faults(&mut self, faults: Vec<FaultEvent>) {
        self.current.fault_flags = faults;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Always returns the midpoint of the requested range.
    struct MidpointRandom;

    impl RandomSource for MidpointRandom {
        fn uniform(&mut self, low: f64, high: f64) -> f64 {
            (low + high) / 2.0
        }

        fn unit(&mut self) -> f64 {
            0.999
        }

        fn index(&mut self, _len: usize) -> usize {
            0
        }
    }

    /// Always returns the upper bound, pushing every field to its ceiling.
    struct MaxRandom;

    impl RandomSource for MaxRandom {
        fn uniform(&mut self, _low: f64, high: f64) -> f64 {
            high
        }

        fn unit(&mut self) -> f64 {
            0.0
        }

        fn index(&mut self, len: usize) -> usize {
            len - 1
        }
    }

    #[test]
    fn midpoint_deltas_keep_seed_values() {
        let mut synth = ReadingSynthesizer::new(Box::new(MidpointRandom));
        let before = synth.current().timestamp;
        let snapshot = synth.advance();
        assert_eq!(snapshot.voltage, 48.5);
        assert_eq!(snapshot.current, 0.0);
        assert_eq!(snapshot.temperature, 25.0);
        assert_eq!(snapshot.soc, 75.0);
        assert_eq!(snapshot.soh, 95.0);
        assert!(snapshot.fault_flags.is_empty());
        assert!(snapshot.timestamp >= before);
    }

    #[test]
    fn walk_saturates_at_clamp_ceiling() {
        let mut synth = ReadingSynthesizer::new(Box::new(MaxRandom));
        let mut last = synth.advance();
        for _ in 0..200 {
            last = synth.advance();
        }
        assert_eq!(last.voltage, 54.0);
        assert_eq!(last.current, 20.0);
        assert_eq!(last.temperature, 45.0);
        assert_eq!(last.soc, 100.0);
        assert_eq!(last.soh, 100.0);
    }

    #[test]
    fn clamp_invariant_holds_over_many_ticks() {
        let mut synth = ReadingSynthesizer::seeded(0xBA77);
        let profile = *synth.profile();
        for _ in 0..20_000 {
            let snapshot = synth.advance();
            for parameter in Parameter::iter() {
                let value = snapshot.value(parameter);
                assert!(
                    profile.field(parameter).contains(value),
                    "{parameter} out of range: {value}"
                );
            }
        }
    }

    #[test]
    fn consecutive_readings_move_by_at_most_one_step() {
        let mut synth = ReadingSynthesizer::seeded(5);
        let profile = *synth.profile();
        let mut previous = synth.advance();
        for _ in 0..500 {
            let next = synth.advance();
            for parameter in Parameter::iter() {
                let delta = (next.value(parameter) - previous.value(parameter)).abs();
                assert!(delta <= profile.field(parameter).step + 1e-9);
            }
            previous = next;
        }
    }

    #[test]
    fn advance_clears_previous_faults() {
        let mut synth = ReadingSynthesizer::seeded(1);
        synth.set_faults(vec![FaultEvent::new(
            crate::snapshot::FaultCode::Overvoltage,
            Utc::now(),
        )]);
        assert!(synth.advance().fault_flags.is_empty());
    }
}
