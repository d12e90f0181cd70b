//! ---
//! volture_section: "01-core-functionality"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "History sources backing the pull interface."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use volture_common::{HistoryConfig, HistoryMode};
use volture_sim::{BatterySnapshot, HistoryPoint, SeededRandom, SyntheticHistory};

/// Ring buffer of the snapshots produced by actual ticks.
#[derive(Debug)]
pub struct RetentionBuffer {
    capacity: usize,
    points: Mutex<VecDeque<HistoryPoint>>,
}

impl RetentionBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn record(&self, snapshot: &BatterySnapshot) {
        let mut points = self.points.lock();
        if points.len() == self.capacity {
            points.pop_front();
        }
        points.push_back(HistoryPoint::from(snapshot));
    }

    /// Retained points stamped at or after `since`, newest first.
    pub fn since(&self, since: DateTime<Utc>) -> Vec<HistoryPoint> {
        self.points
            .lock()
            .iter()
            .rev()
            .take_while(|point| point.time >= since)
            .cloned()
            .collect()
    }
}

/// Where history queries are answered from.
pub enum HistorySource {
    /// Fresh independent random points per request.
    Synthetic {
        generator: SyntheticHistory,
        rng: Mutex<SeededRandom>,
    },
    /// Snapshots recorded by the distribution hub.
    Retained(Arc<RetentionBuffer>),
}

impl std::fmt::Debug for HistorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistorySource::Synthetic { generator, .. } => f
                .debug_struct("Synthetic")
                .field("generator", generator)
                .finish_non_exhaustive(),
            HistorySource::Retained(buffer) => f.debug_tuple("Retained").field(buffer).finish(),
        }
    }
}

impl HistorySource {
    pub fn synthetic(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SeededRandom::seed_from_u64(seed),
            None => SeededRandom::from_entropy(),
        };
        HistorySource::Synthetic {
            generator: SyntheticHistory::default(),
            rng: Mutex::new(rng),
        }
    }

    pub fn retained(buffer: Arc<RetentionBuffer>) -> Self {
        HistorySource::Retained(buffer)
    }

    /// Build the source selected by configuration. The retention buffer is
    /// returned separately so the hub can feed it.
    pub fn from_config(
        config: &HistoryConfig,
        seed: Option<u64>,
    ) -> (Self, Option<Arc<RetentionBuffer>>) {
        match config.mode {
            HistoryMode::Synthetic => (Self::synthetic(seed), None),
            HistoryMode::Retained => {
                let buffer = Arc::new(RetentionBuffer::new(config.retain_last));
                (Self::retained(buffer.clone()), Some(buffer))
            }
        }
    }

    pub fn mode(&self) -> HistoryMode {
        match self {
            HistorySource::Synthetic { .. } => HistoryMode::Synthetic,
            HistorySource::Retained(_) => HistoryMode::Retained,
        }
    }

    /// Points covering the last `hours`, newest first.
    pub fn points(&self, now: DateTime<Utc>, hours: u32) -> Vec<HistoryPoint> {
        match self {
            HistorySource::Synthetic { generator, rng } => {
                generator.generate(now, hours, &mut *rng.lock())
            }
            HistorySource::Retained(buffer) => {
                buffer.since(now - Duration::hours(i64::from(hours)))
            }
        }
    }
}
