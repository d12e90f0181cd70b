//! ---
//! volture_section: "01-core-functionality"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Tracing subscriber setup for the battery monitor daemon."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "VOLTURE_LOG";
const FALLBACK_FILTER: &str = "debug";

/// Flush guards for the non-blocking writers; dropping them loses buffered lines.
struct WriterGuards {
    _stdout: WorkerGuard,
    _file: WorkerGuard,
}

static GUARDS: OnceCell<WriterGuards> = OnceCell::new();

/// Stdout rendering for the daemon. The rolling file is always JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Install the global subscriber: filtered stdout in `config.format` plus a
/// daily `<prefix>.log` JSON file under `config.directory`.
///
/// Filter precedence is `VOLTURE_LOG`, then `RUST_LOG`, then `debug`. Calling
/// this twice keeps the first subscriber.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    let (file_writer, file_guard) = open_log_file(service_name, config)?;
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let _ = GUARDS.set(WriterGuards {
        _stdout: stdout_guard,
        _file: file_guard,
    });

    let filter = resolve_filter(
        std::env::var(LOG_ENV).ok().as_deref(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer(config.format, stdout_writer))
        .with(
            fmt::layer()
                .json()
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_writer(file_writer),
        )
        .try_init()
        .ok();

    info!(
        service = %service_name,
        log_dir = %config.directory.display(),
        format = ?config.format,
        "tracing initialised"
    );
    Ok(())
}

fn open_log_file(service_name: &str, config: &LoggingConfig) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(&config.directory)?;
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
    let appender = daily(&config.directory, format!("{prefix}.log"));
    Ok(tracing_appender::non_blocking(appender))
}

fn stdout_layer<S>(format: LogFormat, writer: NonBlocking) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let layer = fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(writer);
    match format {
        LogFormat::StructuredJson => layer.with_target(false).json().boxed(),
        LogFormat::Pretty => layer.boxed(),
    }
}

/// First directive that parses wins; a malformed `VOLTURE_LOG` is reported on
/// stderr because the subscriber is not installed yet.
fn resolve_filter(volture_log: Option<&str>, rust_log: Option<&str>) -> EnvFilter {
    if let Some(directive) = volture_log {
        match EnvFilter::try_new(directive) {
            Ok(filter) => return filter,
            Err(err) => eprintln!("ignoring invalid {LOG_ENV} directive '{directive}': {err}"),
        }
    }
    rust_log
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_FILTER))
}
