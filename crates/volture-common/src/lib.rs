//! ---
//! volture_section: "01-core-functionality"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Shared primitives and utilities for the telemetry runtime."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
//! Shared primitives for the Volture workspace.
//! This crate exposes configuration loading, tracing initialisation and the
//! loop timing reporter consumed by the tick driver.

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{
    ApiConfig, AppConfig, HistoryConfig, HistoryMode, LoadedAppConfig, LoggingConfig,
    MetricsConfig, SimulationConfig, TelemetryConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use metrics::{JitterHistogram, JitterSummary, LoopTimingReporter};
