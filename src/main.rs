// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/carmon

//! CarMon - Vehicle Telemetry Acquisition and Simulation Engine
//!
//! Headless runner: polls the vehicle (or simulates one) and logs status
//! changes and alerts until interrupted.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use carmon::config::AcquisitionMode;
use carmon::{build_info, Config, Engine, Event, EventPayload, Scenario, SharedState, VERSION};

/// CarMon - Vehicle Telemetry Acquisition and Simulation Engine
#[derive(Parser, Debug)]
#[command(name = "carmon")]
#[command(author = "CarMon Project")]
#[command(version = VERSION)]
#[command(about = "Vehicle telemetry acquisition with a built-in simulator")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the built-in simulator instead of the vehicle
    #[arg(long, conflicts_with = "remote")]
    simulate: bool,

    /// Poll the vehicle at this base URL
    #[arg(long)]
    remote: Option<String>,

    /// Scenario to start the simulator in
    #[arg(long)]
    scenario: Option<Scenario>,

    /// Use the background refresh period
    #[arg(long)]
    background: bool,

    /// Data output directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let build = build_info();
    info!("CarMon v{} ({} / {})", build.version, build.os, build.target);

    // Load or create configuration
    let config_path = args.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override with command line args
    if args.simulate {
        config.acquisition.mode = AcquisitionMode::Simulated;
    }
    if let Some(url) = args.remote {
        config.acquisition.mode = AcquisitionMode::Remote;
        config.acquisition.base_url = url;
    }
    if let Some(scenario) = args.scenario {
        config.simulation.initial_scenario = scenario;
    }
    if args.background {
        config.acquisition.background = true;
    }
    if let Some(data_dir) = args.data_dir {
        config.database.path = data_dir.join("carmon.db");
        config.data_dir = data_dir;
    }

    info!("Configuration loaded from {:?}", config_path);
    info!("Acquisition mode: {:?}", config.acquisition.mode);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_headless(config))
}

/// Log what the engine publishes
async fn log_events(state: SharedState, mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(event) => match event.payload {
                EventPayload::StatusChanged => {
                    let status = state.snapshot();
                    debug!(
                        "Battery {}% ({}, {:.2} V) | Motor {} {}% {} | {:.1}°C | connected: {}",
                        status.battery_level(),
                        status.battery_health(),
                        status.battery_voltage(),
                        status.motor_status(),
                        status.motor_speed(),
                        status.motor_direction(),
                        status.system_temperature(),
                        status.is_connected()
                    );
                }
                EventPayload::AlertRaised { kind, message } => {
                    info!("Alert [{}]: {}", kind.title(), message);
                }
                EventPayload::CriticalAlertRaised { title, message } => {
                    warn!("CRITICAL {}: {}", title, message);
                }
            },
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event logger fell behind, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Run the engine until Ctrl+C
async fn run_headless(config: Config) -> Result<()> {
    let mut engine = Engine::new(config)?;
    let logger = tokio::spawn(log_events(engine.state().clone(), engine.subscribe()));

    engine.start().await?;

    info!("CarMon running");
    info!("   Press Ctrl+C to shutdown");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, cleaning up...");
    engine.stop().await?;

    let trips = engine.trips();
    info!("{} trips in history", trips.len());
    if let Some(latest) = trips.first() {
        info!(
            "Latest trip: {} {} -> {}, {} in {}",
            latest.formatted_time_range(),
            latest.start_location(),
            latest.end_location(),
            latest.formatted_distance(),
            latest.formatted_duration()
        );
    }

    drop(engine);
    logger.abort();

    info!("CarMon shutdown complete");
    Ok(())
}
