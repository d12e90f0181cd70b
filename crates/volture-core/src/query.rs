//! ---
//! volture_section: "01-core-functionality"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "On-demand snapshot and history queries."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use volture_sim::{BatterySnapshot, HistoryPoint, TelemetrySource};

use crate::alerts::{evaluate, Alert, ThresholdTable};
use crate::history::HistorySource;

/// Response to a one-shot reading request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentReading {
    pub data: BatterySnapshot,
    pub alerts: Vec<Alert>,
    pub thresholds: ThresholdTable,
    pub timestamp: DateTime<Utc>,
}

/// Client-side errors raised by query validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("hours must be a positive integer, got '{0}'")]
    InvalidHours(String),
    #[error("hours must be between 1 and {max}, got {hours}")]
    HoursOutOfRange { hours: u64, max: u32 },
}

/// Stateless facade for pull requests. Every snapshot call advances the shared
/// reading, exactly like a tick, but nothing is fanned out.
#[derive(Debug)]
pub struct QueryService {
    source: Arc<TelemetrySource>,
    thresholds: ThresholdTable,
    history: HistorySource,
    max_hours: u32,
}

impl QueryService {
    pub const DEFAULT_HOURS: u32 = 1;

    pub fn new(
        source: Arc<TelemetrySource>,
        thresholds: ThresholdTable,
        history: HistorySource,
        max_hours: u32,
    ) -> Self {
        Self {
            source,
            thresholds,
            history,
            max_hours: max_hours.max(1),
        }
    }

    pub fn snapshot(&self) -> CurrentReading {
        let data = self.source.advance();
        let alerts = evaluate(&data, &self.thresholds);
        debug!(alerts = alerts.len(), "on-demand reading produced");
        CurrentReading {
            data,
            alerts,
            thresholds: self.thresholds,
            timestamp: Utc::now(),
        }
    }

    /// History covering the last `hours`, newest first.
    pub fn history(&self, hours: u32) -> Result<Vec<HistoryPoint>, QueryError> {
        if hours == 0 || hours > self.max_hours {
            return Err(QueryError::HoursOutOfRange {
                hours: u64::from(hours),
                max: self.max_hours,
            });
        }
        let points = self.history.points(Utc::now(), hours);
        debug!(hours, points = points.len(), mode = ?self.history.mode(), "history produced");
        Ok(points)
    }

    /// Validate a raw `hours` parameter as received from a transport. Absent means
    /// [`Self::DEFAULT_HOURS`].
    pub fn parse_hours(&self, raw: Option<&str>) -> Result<u32, QueryError> {
        let Some(raw) = raw else {
            return Ok(Self::DEFAULT_HOURS);
        };
        let trimmed = raw.trim();
        let invalid = || QueryError::InvalidHours(trimmed.to_owned());
        // `u64::from_str` would also take a leading '+'.
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hours: u64 = trimmed.parse().map_err(|_| invalid())?;
        if hours == 0 || hours > u64::from(self.max_hours) {
            return Err(QueryError::HoursOutOfRange {
                hours,
                max: self.max_hours,
            });
        }
        // Bounded by max_hours above.
        Ok(hours as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> QueryService {
        QueryService::new(
            Arc::new(TelemetrySource::from_seed(Some(3), 0.05)),
            ThresholdTable::default(),
            HistorySource::synthetic(Some(3)),
            24,
        )
    }

    #[test]
    fn snapshot_includes_thresholds() {
        let reading = service().snapshot();
        assert_eq!(reading.thresholds, ThresholdTable::default());
        assert!(reading.timestamp >= reading.data.timestamp);
    }

    #[test]
    fn snapshot_advances_shared_source() {
        let source = Arc::new(TelemetrySource::from_seed(Some(10), 0.0));
        let service = QueryService::new(
            source.clone(),
            ThresholdTable::default(),
            HistorySource::synthetic(None),
            1,
        );
        let reading = service.snapshot();
        assert_eq!(source.current(), reading.data);
    }

    #[test]
    fn history_of_two_hours_has_120_points() {
        let points = service().history(2).unwrap();
        assert_eq!(points.len(), 120);
        assert!(points.windows(2).all(|pair| pair[0].time >= pair[1].time));
    }

    #[test]
    fn history_rejects_out_of_range_hours() {
        let service = service();
        assert_eq!(
            service.history(0),
            Err(QueryError::HoursOutOfRange { hours: 0, max: 24 })
        );
        assert!(service.history(25).is_err());
    }

    #[test]
    fn parse_hours_validates_input() {
        let service = service();
        assert_eq!(service.parse_hours(None), Ok(1));
        assert_eq!(service.parse_hours(Some(" 6 ")), Ok(6));
        assert_eq!(
            service.parse_hours(Some("abc")),
            Err(QueryError::InvalidHours("abc".into()))
        );
        assert!(matches!(
            service.parse_hours(Some("-2")),
            Err(QueryError::InvalidHours(_))
        ));
        assert_eq!(
            service.parse_hours(Some("+5")),
            Err(QueryError::InvalidHours("+5".into()))
        );
        assert!(matches!(
            service.parse_hours(Some("")),
            Err(QueryError::InvalidHours(_))
        ));
        assert!(matches!(
            service.parse_hours(Some("1.5")),
            Err(QueryError::InvalidHours(_))
        ));
        assert!(matches!(
            service.parse_hours(Some("0")),
            Err(QueryError::HoursOutOfRange { hours: 0, .. })
        ));
        assert!(matches!(
            service.parse_hours(Some("99999999999")),
            Err(QueryError::HoursOutOfRange { .. })
        ));
    }
}
