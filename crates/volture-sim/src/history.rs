//! ---
//! volture_section: "02-telemetry-simulation"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Synthetic per-minute history series."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::random::RandomSource;
use crate::snapshot::BatterySnapshot;

/// One point of a history series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryPoint {
    pub time: DateTime<Utc>,
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
    pub soc: f64,
    pub soh: f64,
}

impl From<&BatterySnapshot> for HistoryPoint {
    fn from(snapshot: &BatterySnapshot) -> Self {
        Self {
            time: snapshot.timestamp,
            voltage: snapshot.voltage,
            current: snapshot.current,
            temperature: snapshot.temperature,
            soc: snapshot.soc,
            soh: snapshot.soh,
        }
    }
}

/// `center ± spread` sampling band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryBand {
    pub center: f64,
    pub spread: f64,
}

impl HistoryBand {
    pub const fn new(center: f64, spread: f64) -> Self {
        Self { center, spread }
    }

    fn sample(&self, rng: &mut dyn RandomSource) -> f64 {
        self.center + rng.uniform(-self.spread, self.spread)
    }

    pub fn contains(&self, value: f64) -> bool {
        (value - self.center).abs() <= self.spread + 1e-9
    }
}

/// Generates history points that are independent of the live reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticHistory {
    pub voltage: HistoryBand,
    pub current: HistoryBand,
    pub temperature: HistoryBand,
    pub soc: HistoryBand,
    pub soh: HistoryBand,
}

impl Default for SyntheticHistory {
    fn default() -> Self {
        Self {
            voltage: HistoryBand::new(48.5, 2.0),
            current: HistoryBand::new(0.0, 10.0),
            temperature: HistoryBand::new(25.0, 5.0),
            soc: HistoryBand::new(75.0, 10.0),
            soh: HistoryBand::new(95.0, 2.0),
        }
    }
}

impl SyntheticHistory {
    pub const POINTS_PER_HOUR: usize = 60;

    /// One point per minute, newest first: point `i` is stamped `now - i` minutes.
    pub fn generate(
        &self,
        now: DateTime<Utc>,
        hours: u32,
        rng: &mut dyn RandomSource,
    ) -> Vec<HistoryPoint> {
        let count = hours as usize * Self::POINTS_PER_HOUR;
        (0..count)
            .map(|minute| HistoryPoint {
                time: now - Duration::minutes(minute as i64),
                voltage: self.voltage.sample(rng),
                current: self.current.sample(rng),
                temperature: self.temperature.sample(rng),
                soc: self.soc.sample(rng),
                soh: self.soh.sample(rng),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;

    #[test]
    fn two_hours_yield_120_descending_points() {
        let history = SyntheticHistory::default();
        let mut rng = SeededRandom::seed_from_u64(2);
        let now = Utc::now();
        let points = history.generate(now, 2, &mut rng);
        assert_eq!(points.len(), 120);
        assert_eq!(points[0].time, now);
        assert_eq!(points[119].time, now - Duration::minutes(119));
        assert!(points.windows(2).all(|pair| pair[0].time >= pair[1].time));
    }

    #[test]
    fn values_stay_inside_bands() {
        let history = SyntheticHistory::default();
        let mut rng = SeededRandom::seed_from_u64(8);
        for point in history.generate(Utc::now(), 3, &mut rng) {
            assert!(history.voltage.contains(point.voltage));
            assert!(history.current.contains(point.current));
            assert!(history.temperature.contains(point.temperature));
            assert!(history.soc.contains(point.soc));
            assert!(history.soh.contains(point.soh));
        }
    }
}
