//! ---
//! volture_section: "01-core-functionality"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "TOML configuration model, loading and validation."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_tick_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_delivery_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_max_subscribers() -> usize {
    256
}

fn default_fault_probability() -> f64 {
    0.05
}

fn default_sink_buffer() -> usize {
    16
}

fn default_retain_last() -> usize {
    // One hour of ticks at the default two second period.
    1800
}

fn default_max_hours() -> u32 {
    168
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9898))
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_allow_any_origin() -> bool {
    true
}

/// Primary configuration object for the telemetry daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no candidate existed and built-in defaults are in effect.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "VOLTURE_CONFIG";

    /// Load configuration from disk together with the effective source path.
    ///
    /// `VOLTURE_CONFIG` takes precedence and must point to a readable file. The
    /// candidates are inspected in order; when none exists the defaults apply.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        let config = AppConfig::default();
        config.validate()?;
        Ok(LoadedAppConfig {
            config,
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.telemetry.validate()?;
        self.history.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Tick scheduling and fan-out settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(rename = "tick_interval_ms", default = "default_tick_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub tick_interval: Duration,
    #[serde(rename = "delivery_timeout_ms", default = "default_delivery_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub delivery_timeout: Duration,
    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,
    #[serde(default = "default_fault_probability")]
    pub fault_probability: f64,
    /// Per-subscriber channel depth used by push transports.
    #[serde(default = "default_sink_buffer")]
    pub sink_buffer: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            delivery_timeout: default_delivery_timeout(),
            max_subscribers: default_max_subscribers(),
            fault_probability: default_fault_probability(),
            sink_buffer: default_sink_buffer(),
        }
    }
}

impl TelemetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(anyhow!("telemetry.tick_interval_ms must be greater than zero"));
        }
        if self.delivery_timeout.is_zero() {
            return Err(anyhow!(
                "telemetry.delivery_timeout_ms must be greater than zero"
            ));
        }
        if self.max_subscribers == 0 {
            return Err(anyhow!("telemetry.max_subscribers must be at least 1"));
        }
        if self.sink_buffer == 0 {
            return Err(anyhow!("telemetry.sink_buffer must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.fault_probability) {
            return Err(anyhow!(
                "telemetry.fault_probability {} must lie within [0, 1]",
                self.fault_probability
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Fixed seed for reproducible runs; entropy-seeded when absent.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Source used to answer history queries.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    /// Independent random points, one per minute, unrelated to live ticks.
    #[default]
    Synthetic,
    /// Bounded buffer of the snapshots actually produced by the tick driver.
    Retained,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub mode: HistoryMode,
    #[serde(default = "default_retain_last")]
    pub retain_last: usize,
    #[serde(default = "default_max_hours")]
    pub max_hours: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            mode: HistoryMode::default(),
            retain_last: default_retain_last(),
            max_hours: default_max_hours(),
        }
    }
}

impl HistoryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_hours == 0 {
            return Err(anyhow!("history.max_hours must be at least 1"));
        }
        if self.mode == HistoryMode::Retained && self.retain_last == 0 {
            return Err(anyhow!(
                "history.retain_last must be at least 1 in retained mode"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_allow_any_origin")]
    pub allow_any_origin: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            listen: default_api_listen(),
            allow_any_origin: default_allow_any_origin(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
