//! ---
//! volture_section: "01-core-functionality"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Per-tick synthesis and fan-out to subscriber sinks."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::FutureExt;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use volture_common::TelemetryConfig;
use volture_metrics::TelemetryMetrics;
use volture_sim::{BatterySnapshot, TelemetrySource};

use crate::alerts::{evaluate, Alert, ThresholdTable};
use crate::history::RetentionBuffer;
use crate::sink::{DeliveryError, SubscriptionId, TelemetrySink};

/// Payload pushed to every subscriber on each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryUpdate {
    pub data: BatterySnapshot,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("subscriber limit of {limit} reached")]
    SubscriberLimit { limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubSettings {
    pub max_subscribers: usize,
    pub delivery_timeout: Duration,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self::from(&TelemetryConfig::default())
    }
}

impl From<&TelemetryConfig> for HubSettings {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            max_subscribers: config.max_subscribers,
            delivery_timeout: config.delivery_timeout,
        }
    }
}

/// Outcome of one [`DistributionHub::tick`].
#[derive(Debug, Clone)]
pub struct TickReport {
    pub update: Arc<TelemetryUpdate>,
    pub delivered: usize,
    /// Sinks that failed and were unsubscribed during this tick.
    pub dropped: Vec<SubscriptionId>,
}

/// Produces one reading per tick and pushes it to every registered sink.
///
/// The sink set is copied before delivery, so subscribe and unsubscribe never
/// wait on a slow sink and may run while a tick is in flight.
pub struct DistributionHub {
    source: Arc<TelemetrySource>,
    thresholds: ThresholdTable,
    settings: HubSettings,
    sinks: RwLock<IndexMap<SubscriptionId, Arc<dyn TelemetrySink>>>,
    retention: Option<Arc<RetentionBuffer>>,
    metrics: Option<TelemetryMetrics>,
}

impl std::fmt::Debug for DistributionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributionHub")
            .field("settings", &self.settings)
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl DistributionHub {
    pub fn new(
        source: Arc<TelemetrySource>,
        thresholds: ThresholdTable,
        settings: HubSettings,
    ) -> Self {
        Self {
            source,
            thresholds,
            settings,
            sinks: RwLock::new(IndexMap::new()),
            retention: None,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: TelemetryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Record every tick's reading into `buffer`.
    pub fn with_retention(mut self, buffer: Arc<RetentionBuffer>) -> Self {
        self.retention = Some(buffer);
        self
    }

    pub fn subscribe(&self, sink: Arc<dyn TelemetrySink>) -> Result<SubscriptionId, HubError> {
        let mut sinks = self.sinks.write();
        if sinks.len() >= self.settings.max_subscribers {
            warn!(
                limit = self.settings.max_subscribers,
                "subscription rejected; subscriber limit reached"
            );
            return Err(HubError::SubscriberLimit {
                limit: self.settings.max_subscribers,
            });
        }
        let id = SubscriptionId::new();
        sinks.insert(id, sink);
        let count = sinks.len();
        drop(sinks);
        self.publish_subscriber_count(count);
        info!(subscription = %id, subscribers = count, "subscriber registered");
        Ok(id)
    }

    /// Remove a sink. Returns `false` when `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut sinks = self.sinks.write();
        let removed = sinks.shift_remove(&id).is_some();
        let count = sinks.len();
        drop(sinks);
        if removed {
            self.publish_subscriber_count(count);
            info!(subscription = %id, subscribers = count, "subscriber removed");
        }
        removed
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.sinks.read().contains_key(&id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sinks.read().len()
    }

    /// Advance the reading, evaluate alerts and deliver the payload to the sinks
    /// registered when delivery starts. Failing sinks are unsubscribed; the tick
    /// itself never fails.
    pub async fn tick(&self) -> TickReport {
        let started = Instant::now();
        let update = Arc::new(self.produce());

        let targets: Vec<(SubscriptionId, Arc<dyn TelemetrySink>)> = self
            .sinks
            .read()
            .iter()
            .map(|(id, sink)| (*id, sink.clone()))
            .collect();

        let timeout = self.settings.delivery_timeout;
        let deliveries = targets.into_iter().map(|(id, sink)| {
            let update = update.clone();
            async move {
                let delivery = tokio::time::timeout(timeout, sink.deliver(update));
                let outcome = match AssertUnwindSafe(delivery).catch_unwind().await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => Err(DeliveryError::TimedOut(timeout)),
                    Err(_) => Err(DeliveryError::Panicked),
                };
                (id, outcome)
            }
        });

        let mut delivered = 0;
        let mut dropped = Vec::new();
        for (id, outcome) in join_all(deliveries).await {
            match outcome {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(subscription = %id, error = %err, "sink delivery failed; unsubscribing");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_delivery_failure(err.reason());
                    }
                    self.unsubscribe(id);
                    dropped.push(id);
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.add_deliveries(delivered);
            metrics.observe_tick(started.elapsed().as_secs_f64());
        }
        debug!(
            delivered,
            dropped = dropped.len(),
            alerts = update.alerts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tick distributed"
        );

        TickReport {
            update,
            delivered,
            dropped,
        }
    }

    fn produce(&self) -> TelemetryUpdate {
        let data = self.source.advance();
        let alerts = evaluate(&data, &self.thresholds);

        if let Some(buffer) = &self.retention {
            buffer.record(&data);
        }
        for fault in &data.fault_flags {
            warn!(code = fault.code, fault = %fault.description, "battery fault injected");
            if let Some(metrics) = &self.metrics {
                metrics.record_fault(&fault.description);
            }
        }
        for alert in &alerts {
            debug!(parameter = %alert.parameter, value = alert.value, threshold = alert.threshold, "threshold alert raised");
            if let Some(metrics) = &self.metrics {
                metrics.record_alert(alert.parameter.as_ref());
            }
        }

        TelemetryUpdate { data, alerts }
    }

    fn publish_subscriber_count(&self, count: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.set_subscribers(count);
        }
    }
}
