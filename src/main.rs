//! telemetryd - Main Entry Point
//!
//! Loads the device configuration, resolves the transport profile, and
//! drives the connection supervisor and telemetry scheduler until a
//! shutdown signal arrives or the retry budget is exhausted.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use telemetryd::config::DeviceConfig;
use telemetryd::link::mqtt::{LinkSettings, RumqttcLink};
use telemetryd::observability::init_default_logging;
use telemetryd::runtime::{DeviceRuntime, RuntimeSettings};
use telemetryd::status::LogReporter;
use telemetryd::telemetry::SimulatedSensor;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

/// Device connection supervisor and telemetry publisher
#[derive(Parser)]
#[command(name = "telemetryd")]
#[command(about = "Device connection supervisor and telemetry publisher")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the device loop
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration with secrets redacted
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting telemetryd v{}", env!("CARGO_PKG_VERSION"));

    let (config, config_dir) = match load_configuration(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_device(config, &config_dir).await,
        Commands::Config { show } => handle_config_command(config, &config_dir, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<(DeviceConfig, PathBuf), Box<dyn std::error::Error>> {
    let path = match config_path {
        Some(path) => path.clone(),
        None => {
            let default_paths = ["device.toml", "config/device.toml"];
            match default_paths.iter().map(PathBuf::from).find(|p| p.exists()) {
                Some(path) => path,
                None => {
                    error!(
                        "No configuration file found. Provide one with -c/--config or create device.toml"
                    );
                    process::exit(1);
                }
            }
        }
    };

    info!("Loading configuration from: {}", path.display());
    let config = DeviceConfig::load_from_file(&path)?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    Ok((config, dir))
}

async fn run_device(
    config: DeviceConfig,
    config_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    // Profile errors (missing fields, unreadable certs) are fatal at
    // startup; they can never be retried into working.
    let profile = config.broker.resolve(config_dir)?;

    let settings = LinkSettings {
        subscribe_topic: config.telemetry.subscribe_topic.clone(),
        ..LinkSettings::default()
    };
    let link = RumqttcLink::new(profile.host.clone(), profile.port, settings);
    let sensor = SimulatedSensor::new(Some(profile.device_id().to_string()));

    let mut runtime = DeviceRuntime::new(
        link,
        profile,
        RuntimeSettings::from_config(&config),
        Box::new(sensor),
        Box::new(LogReporter),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut runtime_handle = tokio::spawn(async move { runtime.run(shutdown_rx).await });

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    info!("Device loop is running");

    let joined = tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
            let _ = shutdown_tx.send(true);
            (&mut runtime_handle).await
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
            let _ = shutdown_tx.send(true);
            (&mut runtime_handle).await
        }
        // The loop also stops on its own when a bounded retry policy
        // runs out of attempts.
        joined = &mut runtime_handle => joined,
    };

    joined??;
    Ok(())
}

fn handle_config_command(
    config: DeviceConfig,
    config_dir: &Path,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Resolving the profile exercises the same checks `run` performs,
    // including reading the certificate files.
    let profile = config.broker.resolve(config_dir)?;
    info!(
        mode = profile.mode_name(),
        host = %profile.host,
        port = profile.port,
        device_id = %profile.device_id(),
        "configuration is valid"
    );

    if show {
        let redacted = config.redacted();
        println!("{}", toml::to_string_pretty(&redacted)?);
    }
    Ok(())
}
