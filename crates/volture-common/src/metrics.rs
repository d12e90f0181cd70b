//! ---
//! volture_section: "01-core-functionality"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Tick timing and jitter statistics."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// Bounded set of jitter samples in nanoseconds.
#[derive(Debug)]
pub struct JitterHistogram {
    samples: Mutex<Vec<f64>>,
    capacity: usize,
}

impl Default for JitterHistogram {
    fn default() -> Self {
        Self::with_capacity(4096)
    }
}

impl JitterHistogram {
    /// Keep at most `capacity` samples; the oldest sample is evicted first.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, jitter: Duration) {
        let nanos = jitter.as_secs_f64() * 1_000_000_000.0;
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.remove(0);
        }
        samples.push(nanos);
    }

    pub fn summary(&self) -> Option<JitterSummary> {
        let samples = self.samples.lock();
        let slice = samples.as_slice();
        if slice.is_empty() {
            return None;
        }
        let count = slice.len() as f64;
        let mean = slice.iter().sum::<f64>() / count;
        let variance = if slice.len() > 1 {
            let sum_sq = slice
                .iter()
                .map(|value| {
                    let delta = value - mean;
                    delta * delta
                })
                .sum::<f64>();
            sum_sq / (count - 1.0)
        } else {
            0.0
        };
        let max = slice.iter().copied().fold(f64::MIN, f64::max);
        let min = slice.iter().copied().fold(f64::MAX, f64::min);
        Some(JitterSummary {
            mean_ns: mean,
            std_dev_ns: variance.sqrt(),
            max_ns: max,
            min_ns: min,
            samples: slice.len() as u64,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JitterSummary {
    pub mean_ns: f64,
    pub std_dev_ns: f64,
    pub max_ns: f64,
    pub min_ns: f64,
    pub samples: u64,
}

/// Helper for measuring tick intervals against a target period.
#[derive(Debug)]
pub struct LoopTimingReporter {
    target_interval: Duration,
    last_tick: Mutex<Option<Instant>>,
    histogram: JitterHistogram,
}

impl LoopTimingReporter {
    pub fn new(target_interval: Duration) -> Self {
        Self {
            target_interval,
            last_tick: Mutex::new(None),
            histogram: JitterHistogram::default(),
        }
    }

    pub fn record_tick(&self) {
        self.record_tick_at(Instant::now());
    }

    fn record_tick_at(&self, now: Instant) {
        let mut last_tick = self.last_tick.lock();
        if let Some(previous) = *last_tick {
            let actual = now.duration_since(previous);
            let jitter = if actual > self.target_interval {
                actual - self.target_interval
            } else {
                self.target_interval - actual
            };
            self.histogram.record(jitter);
        }
        *last_tick = Some(now);
    }

    pub fn histogram(&self) -> &JitterHistogram {
        &self.histogram
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_records_no_sample() {
        let reporter = LoopTimingReporter::new(Duration::from_millis(100));
        reporter.record_tick();
        assert!(reporter.histogram().summary().is_none());
    }

    #[test]
    fn jitter_is_distance_from_target() {
        let reporter = LoopTimingReporter::new(Duration::from_millis(100));
        let start = Instant::now();
        reporter.record_tick_at(start);
        reporter.record_tick_at(start + Duration::from_millis(110));
        reporter.record_tick_at(start + Duration::from_millis(200));
        let summary = reporter.histogram().summary().unwrap();
        assert_eq!(summary.samples, 2);
        assert!((summary.max_ns - 10_000_000.0).abs() < 1.0);
        assert!((summary.min_ns - 10_000_000.0).abs() < 1.0);
    }

    #[test]
    fn histogram_evicts_oldest_sample() {
        let histogram = JitterHistogram::with_capacity(2);
        histogram.record(Duration::from_millis(5));
        histogram.record(Duration::from_millis(1));
        histogram.record(Duration::from_millis(1));
        let summary = histogram.summary().unwrap();
        assert_eq!(summary.samples, 2);
        assert!((summary.max_ns - 1_000_000.0).abs() < 1.0);
    }
}
