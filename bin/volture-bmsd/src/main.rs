//! ---
//! volture_section: "01-core-functionality"
//! volture_subsection: "binary"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Binary entrypoint for the Volture battery monitor daemon."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};
use volture_common::{init_tracing, AppConfig};
use volture_core::{
    DistributionHub, HistorySource, HubSettings, QueryService, ThresholdTable, TickDriver,
};
use volture_metrics::{
    new_registry, spawn_http_server, DaemonMetrics, SharedRegistry, TelemetryMetrics,
};
use volture_net::RestApiBuilder;
use volture_sim::TelemetrySource;

const SERVICE_NAME: &str = "volture-bmsd";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Volture EV battery telemetry daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "N", help = "Seed the simulator for reproducible readings")]
    seed: Option<u64>,

    #[arg(long, value_name = "ADDR", help = "Override the API listen address")]
    listen: Option<SocketAddr>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the telemetry daemon")]
    Run,
    #[command(about = "Print one current reading as JSON and exit")]
    Snapshot,
    #[command(about = "Print reading history as JSON and exit")]
    History {
        #[arg(long, default_value_t = QueryService::DEFAULT_HOURS)]
        hours: u32,
    },
}

struct Services {
    hub: Arc<DistributionHub>,
    query: Arc<QueryService>,
}

impl Services {
    fn build(config: &AppConfig, metrics: Option<TelemetryMetrics>) -> Self {
        let seed = config.simulation.random_seed;
        let source = Arc::new(TelemetrySource::from_seed(
            seed,
            config.telemetry.fault_probability,
        ));
        let thresholds = ThresholdTable::default();
        let (history, retention) =
            HistorySource::from_config(&config.history, seed.map(|seed| seed.wrapping_add(1)));

        let mut hub = DistributionHub::new(
            source.clone(),
            thresholds,
            HubSettings::from(&config.telemetry),
        );
        if let Some(metrics) = metrics {
            hub = hub.with_metrics(metrics);
        }
        if let Some(buffer) = retention {
            hub = hub.with_retention(buffer);
        }
        let query = QueryService::new(source, thresholds, history, config.history.max_hours);

        Self {
            hub: Arc::new(hub),
            query: Arc::new(query),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/volture.toml"));
    candidates.push(PathBuf::from("configs/example.dev.toml"));

    let load_started = Instant::now();
    let loaded_config = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded_config.config;
    let load_duration = load_started.elapsed();

    let metrics_registry = new_registry();
    let daemon_metrics = DaemonMetrics::new(metrics_registry.clone())?;
    daemon_metrics.observe_config_load(load_duration.as_secs_f64());
    daemon_metrics.inc_start();
    daemon_metrics.set_build_info(env!("CARGO_PKG_VERSION"), build_profile());

    if let Some(seed) = cli.seed {
        config.simulation.random_seed = Some(seed);
    }
    if let Some(listen) = cli.listen {
        config.api.listen = listen;
    }
    init_tracing(SERVICE_NAME, &config.logging)?;
    install_panic_hook();

    match &loaded_config.source {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using defaults"),
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(config, metrics_registry).await?,
        Commands::Snapshot => {
            let services = Services::build(&config, None);
            let reading = services.query.snapshot();
            println!("{}", serde_json::to_string_pretty(&reading)?);
        }
        Commands::History { hours } => {
            let services = Services::build(&config, None);
            let data = services.query.history(hours)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "data": data }))?
            );
        }
    }

    Ok(())
}

async fn run_daemon(config: AppConfig, metrics_registry: SharedRegistry) -> Result<()> {
    let telemetry_metrics = TelemetryMetrics::new(metrics_registry.clone())?;
    let services = Services::build(&config, Some(telemetry_metrics));

    let metrics_server = if config.metrics.enabled {
        info!(address = %config.metrics.listen, "metrics exporter enabled");
        Some(spawn_http_server(metrics_registry, config.metrics.listen)?)
    } else {
        info!("metrics exporter disabled by configuration");
        None
    };

    let driver = TickDriver::new(services.hub.clone(), config.telemetry.tick_interval).spawn();

    let api_server = if config.api.enabled {
        let builder = RestApiBuilder::new(
            config.api.listen,
            services.query.clone(),
            services.hub.clone(),
        )
        .with_sink_buffer(config.telemetry.sink_buffer)
        .allow_any_origin(config.api.allow_any_origin);
        Some(
            builder
                .spawn()
                .await
                .context("failed to start api server")?,
        )
    } else {
        info!("api server disabled by configuration");
        None
    };

    info!(
        tick_ms = config.telemetry.tick_interval.as_millis() as u64,
        history = ?config.history.mode,
        "daemon running; waiting for termination signal"
    );
    signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("ctrl-c received; shutting down");

    let ticks = driver.shutdown().await?;
    info!(ticks, "tick driver drained");

    if let Some(server) = api_server {
        server.shutdown().await?;
    }

    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }

    Ok(())
}

/// Route panics through tracing before the default hook runs. Sink panics are
/// caught by the hub after this hook has logged them.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!(panic = %panic_info, "fatal panic");
        default_hook(panic_info);
    }));
}

fn build_profile() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}
