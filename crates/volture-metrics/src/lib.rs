//! ---
//! volture_section: "03-observability"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Prometheus metrics for the daemon and the tick pipeline."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::core::Collector;
use prometheus::{
    GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub type SharedRegistry = Arc<Registry>;

pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

fn register<M>(registry: &Registry, metric: M) -> Result<M>
where
    M: Collector + Clone + 'static,
{
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

/// Serve `registry` in the text exposition format at `GET /metrics`.
///
/// Binding happens before this returns so a port clash fails daemon startup.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {addr}"))?;
    listener.set_nonblocking(true)?;
    let addr = listener.local_addr()?;
    let listener = TcpListener::from_std(listener)?;

    let app = Router::new()
        .route("/metrics", get(scrape))
        .with_state(registry);
    let (shutdown, stop) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.await;
            })
            .await
            .context("metrics server failed")
    });

    info!(address = %addr, "metrics exporter listening");
    Ok(MetricsServer {
        addr,
        shutdown,
        task,
    })
}

async fn scrape(State(registry): State<SharedRegistry>) -> Response {
    match TextEncoder::new().encode_to_string(&registry.gather()) {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(err) => {
            error!(error = %err, "metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

/// Running exporter started by [`spawn_http_server`].
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task.await.context("metrics server task panicked")?
    }
}

/// Metrics recorded by the daemon process itself.
#[derive(Clone)]
pub struct DaemonMetrics {
    starts_total: IntCounter,
    config_load_seconds: Histogram,
    build_info: GaugeVec,
}

impl DaemonMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let config_buckets = prometheus::exponential_buckets(0.001, 2.0, 16)?;
        Ok(Self {
            starts_total: register(
                &registry,
                IntCounter::new("volture_bmsd_starts_total", "Daemon start-ups")?,
            )?,
            config_load_seconds: register(
                &registry,
                Histogram::with_opts(
                    HistogramOpts::new(
                        "volture_bmsd_config_load_seconds",
                        "Time spent reading and validating the TOML configuration",
                    )
                    .buckets(config_buckets),
                )?,
            )?,
            build_info: register(
                &registry,
                GaugeVec::new(
                    Opts::new("volture_bmsd_build_info", "Version and profile of the daemon"),
                    &["version", "profile"],
                )?,
            )?,
        })
    }

    pub fn inc_start(&self) {
        self.starts_total.inc();
    }

    pub fn observe_config_load(&self, seconds: f64) {
        self.config_load_seconds.observe(seconds);
    }

    pub fn set_build_info(&self, version: &str, profile: &str) {
        self.build_info
            .with_label_values(&[version, profile])
            .set(1.0);
    }
}

/// Tick and fan-out metrics recorded by the distribution hub.
#[derive(Clone)]
pub struct TelemetryMetrics {
    ticks_total: IntCounter,
    tick_seconds: Histogram,
    subscribers: IntGauge,
    deliveries_total: IntCounter,
    delivery_failures: IntCounterVec,
    alerts_total: IntCounterVec,
    faults_total: IntCounterVec,
}

impl TelemetryMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let tick_buckets = prometheus::exponential_buckets(0.0001, 2.0, 16)?;
        let by_label = |name: &str, help: &str, label: &str| -> Result<IntCounterVec> {
            register(&registry, IntCounterVec::new(Opts::new(name, help), &[label])?)
        };
        Ok(Self {
            ticks_total: register(
                &registry,
                IntCounter::new(
                    "volture_ticks_total",
                    "Number of synthesis-and-distribute cycles executed",
                )?,
            )?,
            tick_seconds: register(
                &registry,
                Histogram::with_opts(
                    HistogramOpts::new(
                        "volture_tick_seconds",
                        "Wall time spent producing and delivering one tick",
                    )
                    .buckets(tick_buckets),
                )?,
            )?,
            subscribers: register(
                &registry,
                IntGauge::new("volture_subscribers", "Currently registered push subscribers")?,
            )?,
            deliveries_total: register(
                &registry,
                IntCounter::new(
                    "volture_deliveries_total",
                    "Payloads successfully handed to subscriber sinks",
                )?,
            )?,
            delivery_failures: by_label(
                "volture_delivery_failures_total",
                "Failed sink deliveries by reason; each failure unsubscribes the sink",
                "reason",
            )?,
            alerts_total: by_label(
                "volture_alerts_total",
                "Threshold alerts raised by parameter",
                "parameter",
            )?,
            faults_total: by_label("volture_faults_total", "Injected faults by description", "fault")?,
        })
    }

    pub fn observe_tick(&self, seconds: f64) {
        self.ticks_total.inc();
        self.tick_seconds.observe(seconds);
    }

    pub fn set_subscribers(&self, count: usize) {
        self.subscribers.set(count as i64);
    }

    pub fn add_deliveries(&self, count: usize) {
        self.deliveries_total.inc_by(count as u64);
    }

    pub fn record_delivery_failure(&self, reason: &str) {
        self.delivery_failures.with_label_values(&[reason]).inc();
    }

    pub fn record_alert(&self, parameter: &str) {
        self.alerts_total.with_label_values(&[parameter]).inc();
    }

    pub fn record_fault(&self, fault: &str) {
        self.faults_total.with_label_values(&[fault]).inc();
    }
}

pub use prometheus;
