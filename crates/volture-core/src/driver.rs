//! ---
//! volture_section: "01-core-functionality"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Fixed-period driver invoking the distribution hub."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use volture_common::LoopTimingReporter;
use volture_rt::RateLimiter;

use crate::hub::DistributionHub;

/// The one periodic writer: calls [`DistributionHub::tick`] every `period`.
#[derive(Debug)]
pub struct TickDriver {
    hub: Arc<DistributionHub>,
    period: Duration,
}

impl TickDriver {
    pub fn new(hub: Arc<DistributionHub>, period: Duration) -> Self {
        Self { hub, period }
    }

    /// Start ticking on the current runtime. The first tick fires immediately.
    pub fn spawn(self) -> TickDriverHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let timing = Arc::new(LoopTimingReporter::new(self.period));
        let task_timing = timing.clone();
        let TickDriver { hub, period } = self;

        let task = tokio::spawn(async move {
            let mut limiter = RateLimiter::new(period);
            let mut ticks = 0u64;
            info!(period_ms = period.as_millis() as u64, "tick driver started");
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = limiter.tick() => {}
                }
                task_timing.record_tick();
                // Shutdown is only observed between ticks, so an in-flight tick
                // always completes delivery.
                hub.tick().await;
                ticks += 1;
            }
            info!(ticks, "tick driver stopped");
            ticks
        });

        TickDriverHandle {
            shutdown: shutdown_tx,
            task,
            timing,
        }
    }
}

/// Lifecycle handle for a running [`TickDriver`]. Dropping it also stops the driver.
#[derive(Debug)]
pub struct TickDriverHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<u64>,
    timing: Arc<LoopTimingReporter>,
}

impl TickDriverHandle {
    /// Stop scheduling ticks, wait for the in-flight tick, and return the number
    /// of ticks executed.
    pub async fn shutdown(self) -> Result<u64> {
        let _ = self.shutdown.send(true);
        let ticks = match self.task.await {
            Ok(ticks) => ticks,
            Err(err) => {
                error!(error = %err, "tick driver terminated abnormally");
                return Err(anyhow::anyhow!(err));
            }
        };
        if let Some(summary) = self.timing.histogram().summary() {
            info!(
                samples = summary.samples,
                mean_jitter_us = summary.mean_ns / 1_000.0,
                max_jitter_us = summary.max_ns / 1_000.0,
                "tick jitter summary"
            );
        }
        Ok(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;
    use volture_sim::TelemetrySource;

    use crate::alerts::ThresholdTable;
    use crate::hub::{HubSettings, TelemetryUpdate};
    use crate::sink::{ChannelSink, DeliveryError, TelemetrySink};

    /// Parks delivery until released and records that it ran to completion.
    struct GatedSink {
        entered: Arc<Notify>,
        release: Arc<Notify>,
        completed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl TelemetrySink for GatedSink {
        async fn deliver(&self, _update: Arc<TelemetryUpdate>) -> Result<(), DeliveryError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.completed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct PanickingSink;

    #[async_trait]
    impl TelemetrySink for PanickingSink {
        async fn deliver(&self, _update: Arc<TelemetryUpdate>) -> Result<(), DeliveryError> {
            panic!("sink blew up");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn driver_ticks_on_period_until_shutdown() {
        let hub = Arc::new(DistributionHub::new(
            Arc::new(TelemetrySource::from_seed(Some(1), 0.05)),
            ThresholdTable::default(),
            HubSettings::default(),
        ));
        let (sink, mut rx) = ChannelSink::channel(16);
        hub.subscribe(Arc::new(sink)).unwrap();

        let handle = TickDriver::new(hub.clone(), Duration::from_secs(2)).spawn();
        for _ in 0..3 {
            assert!(rx.recv().await.is_some());
        }
        let ticks = handle.shutdown().await.unwrap();
        assert!(ticks >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn no_ticks_after_shutdown() {
        let hub = Arc::new(DistributionHub::new(
            Arc::new(TelemetrySource::from_seed(Some(2), 0.05)),
            ThresholdTable::default(),
            HubSettings::default(),
        ));
        let (sink, mut rx) = ChannelSink::channel(16);
        hub.subscribe(Arc::new(sink)).unwrap();

        let handle = TickDriver::new(hub.clone(), Duration::from_secs(2)).spawn();
        assert!(rx.recv().await.is_some());
        let ticks = handle.shutdown().await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        let mut extra = 0u64;
        while rx.try_recv().is_ok() {
            extra += 1;
        }
        // Only payloads produced before shutdown returned are buffered.
        assert_eq!(extra, ticks - 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_in_flight_tick() {
        let hub = Arc::new(DistributionHub::new(
            Arc::new(TelemetrySource::from_seed(Some(3), 0.05)),
            ThresholdTable::default(),
            HubSettings {
                max_subscribers: 4,
                delivery_timeout: Duration::from_secs(60),
            },
        ));
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let completed = Arc::new(AtomicBool::new(false));
        hub.subscribe(Arc::new(GatedSink {
            entered: entered.clone(),
            release: release.clone(),
            completed: completed.clone(),
        }))
        .unwrap();

        let handle = TickDriver::new(hub.clone(), Duration::from_secs(2)).spawn();
        entered.notified().await;

        let shutdown = tokio::spawn(handle.shutdown());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!shutdown.is_finished(), "shutdown returned mid-delivery");
        assert!(!completed.load(Ordering::SeqCst));

        release.notify_one();
        let ticks = shutdown.await.unwrap().unwrap();
        assert!(completed.load(Ordering::SeqCst));
        assert_eq!(ticks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_sink_does_not_stop_ticking() {
        let hub = Arc::new(DistributionHub::new(
            Arc::new(TelemetrySource::from_seed(Some(4), 0.05)),
            ThresholdTable::default(),
            HubSettings::default(),
        ));
        let (sink, mut rx) = ChannelSink::channel(16);
        hub.subscribe(Arc::new(sink)).unwrap();
        hub.subscribe(Arc::new(PanickingSink)).unwrap();

        let handle = TickDriver::new(hub.clone(), Duration::from_secs(2)).spawn();
        for _ in 0..5 {
            assert!(rx.recv().await.is_some());
        }
        assert_eq!(hub.subscriber_count(), 1);

        let ticks = handle.shutdown().await.unwrap();
        assert!(ticks >= 5);
    }
}
