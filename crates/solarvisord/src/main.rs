//! solarvisord - The solarvisor background service
//!
//! This is the main entry point for the solarvisord service.
//! It wires together all the components:
//! - Configuration loading and command-line overrides
//! - Host adapter (Linux) and HTTP voltage sensor
//! - Control loop
//! - Signal handling and shutdown

use anyhow::{Context, Result, bail};
use clap::Parser;
use solarvisor_config::{
    ConfigError, ConfigOverrides, RawConfig, Settings, load_raw_config, resolve_settings,
};
use solarvisor_core::{ControlLoop, ProcessSupervisor, ShutdownOutcome};
use solarvisor_host_linux::{HttpVoltageSource, LinuxHost};
use solarvisor_util::{
    MOCK_TIME_ENV_VAR, default_config_path, format_datetime_full, is_mock_time_active,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// solarvisord - Run a workload only while the battery bank can carry it
#[derive(Parser, Debug)]
#[command(name = "solarvisord", version)]
#[command(about = "Battery-voltage-aware process supervisor", long_about = None)]
struct Args {
    /// Command to run while voltage allows (required unless set in the config file)
    #[arg(long)]
    load_cmd: Option<String>,

    /// Start the workload on the first tick regardless of voltage
    #[arg(long)]
    force_start: bool,

    /// Nominal system voltage: 12, 24, 36, 48, 72 or none (default: 48)
    #[arg(long)]
    nominal: Option<String>,

    /// Stop the workload below this voltage (default: from nominal)
    #[arg(long)]
    volts_min: Option<f64>,

    /// Start the workload at or above this voltage (default: from nominal)
    #[arg(long)]
    volts_start_min: Option<f64>,

    /// File receiving the workload's stdout and stderr (default: /dev/null)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Append to the log file instead of truncating it on each start
    #[arg(long)]
    log_append: bool,

    /// Configuration file path, ignored if it does not exist
    /// (default: ~/.config/solarvisor/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Voltage sensor URL (or set SOLARVISOR_SENSOR_URL env var)
    #[arg(long, env = "SOLARVISOR_SENSOR_URL")]
    sensor_url: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            load_cmd: self.load_cmd.clone(),
            log_file: self.log_file.clone(),
            log_append: self.log_append,
            force_start: self.force_start,
            nominal: self.nominal.clone(),
            volts_min: self.volts_min,
            volts_start_min: self.volts_start_min,
            sensor_url: self.sensor_url.clone(),
        }
    }
}

/// Main service state
struct Service {
    control: ControlLoop<LinuxHost, HttpVoltageSource>,
}

impl Service {
    fn new(settings: Settings) -> Result<Self> {
        let host = Arc::new(LinuxHost::new());

        let sensor = Arc::new(
            HttpVoltageSource::new(&settings.sensor.url, settings.sensor.timeout)
                .context("Failed to create voltage sensor client")?,
        );

        info!(
            url = %sensor.url(),
            field = %settings.sensor.voltage_field,
            "Voltage sensor configured"
        );

        let supervisor = ProcessSupervisor::new(host, settings.stop_timings).into_shared();
        let control = ControlLoop::new(
            Arc::new(settings),
            sensor,
            supervisor,
            solarvisor_util::now(),
        );

        Ok(Self { control })
    }

    async fn run(self) -> Result<()> {
        let shutdown_signal = shutdown_signal()?;

        match self.control.run(shutdown_signal).await {
            ShutdownOutcome::StillRunning { pid } => {
                warn!(pid = pid, "Exiting with the workload still running");
            }
            outcome => debug!(outcome = %outcome, "Workload handled"),
        }

        Ok(())
    }
}

/// Resolves on the first SIGTERM or SIGINT.
///
/// Handlers are installed before returning so a signal arriving during the
/// first tick is not lost.
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully");
            }
        }
    })
}

/// Read the config file if present, then layer the command line on top
fn load_settings(args: &Args) -> Result<Settings> {
    let raw = if args.config.exists() {
        let raw = load_raw_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;
        info!(config_path = %args.config.display(), "Configuration loaded");
        raw
    } else {
        debug!(
            config_path = %args.config.display(),
            "No config file, using command line only"
        );
        RawConfig::default()
    };

    match resolve_settings(raw, args.overrides()) {
        Ok(settings) => Ok(settings),
        Err(ConfigError::ValidationFailed { errors }) => {
            for e in &errors {
                error!(error = %e, "Invalid configuration");
            }
            bail!("Configuration has {} error(s)", errors.len());
        }
        Err(e) => Err(e).context("Failed to resolve configuration"),
    }
}

/// Print the resolved settings between `---` rulers
fn print_banner(settings: &Settings) -> Result<()> {
    let body = serde_json::to_string_pretty(&settings.banner_json())
        .context("Failed to render settings")?;
    println!("---\n{}\n---", body);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "solarvisord starting");

    if is_mock_time_active() {
        warn!(
            env = MOCK_TIME_ENV_VAR,
            now = %format_datetime_full(&solarvisor_util::now()),
            "Mock time is active"
        );
    }

    let settings = load_settings(&args)?;
    print_banner(&settings)?;

    let service = Service::new(settings)?;
    service.run().await
}
