//! `hatline` command line tool.

mod cli;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use hatline_core::{Error, HatConfig, HatVariant};
use hatline_events::{EventClass, HatContext};
use hatline_hardware::{AnyGpio, mock::MockGpio};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, Simulation};

const EXIT_BATTERY_LOW: u8 = 1;
const EXIT_INIT_FAILED: u8 = 2;
const EXIT_NOT_CONNECTED: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_INIT_FAILED)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => HatConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => HatConfig::default(),
    };

    let gpio = match cli.simulate {
        Some(simulation) => {
            // A simulated header never contends with a real one.
            if cli.config.is_none() {
                config = config.with_lock_path(std::env::temp_dir().join("hatline-sim.lock"));
            }
            simulated_backend(&config, simulation)?
        }
        None => hardware_backend()?,
    };

    let hat = HatContext::new(config, gpio)?;
    let code = match cli.command {
        Commands::BatteryStatus => battery_status(&hat),
        Commands::Detect => detect(&hat),
        Commands::Watch => watch(&hat).await?,
    };

    hat.clean_up();
    Ok(code)
}

fn simulated_backend(config: &HatConfig, simulation: Simulation) -> Result<AnyGpio> {
    let (gpio, handle) = MockGpio::with_name("Simulated GPIO");
    let pins = config.pins.detection_pins()?;
    handle.set_sample(&pins, simulation.sample());
    info!("Simulating header with pattern {}", simulation.sample());
    Ok(AnyGpio::Mock(gpio))
}

#[cfg(feature = "hardware-rppal")]
fn hardware_backend() -> Result<AnyGpio> {
    let gpio = hatline_hardware::raspberry::RppalGpio::new().context("opening GPIO header")?;
    Ok(AnyGpio::Rppal(gpio))
}

#[cfg(not(feature = "hardware-rppal"))]
fn hardware_backend() -> Result<AnyGpio> {
    anyhow::bail!(
        "built without GPIO support: rebuild with `--features hardware-rppal` or pass --simulate"
    )
}

fn battery_status(hat: &HatContext<AnyGpio>) -> ExitCode {
    match hat.initialise_pro() {
        Ok(()) => {}
        Err(Error::HardwareNotAttached { .. }) => {
            println!("Pro hat not connected");
            return ExitCode::from(EXIT_NOT_CONNECTED);
        }
        Err(e) => {
            println!("could not initialise Pro hat: {e}");
            return ExitCode::from(EXIT_INIT_FAILED);
        }
    }

    println!("the battery is connected");
    match hat.is_battery_low() {
        Ok(low) => {
            println!("is battery low? {}", if low { "yes" } else { "no" });
            if low {
                ExitCode::from(EXIT_BATTERY_LOW)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            println!("could not read battery level: {e}");
            ExitCode::from(EXIT_INIT_FAILED)
        }
    }
}

fn detect(hat: &HatContext<AnyGpio>) -> ExitCode {
    match hat.attached_variant() {
        Ok(Some(variant)) => {
            println!("{variant}");
            ExitCode::SUCCESS
        }
        Ok(None) => {
            println!("none");
            ExitCode::from(EXIT_NOT_CONNECTED)
        }
        Err(e) => {
            println!("could not initialise hat: {e}");
            ExitCode::from(EXIT_INIT_FAILED)
        }
    }
}

async fn watch(hat: &HatContext<AnyGpio>) -> Result<ExitCode> {
    hat.initialise()?;

    hat.register_hat_attached(|| info!("Hat attached"))?;
    hat.register_hat_detached(|| info!("Hat detached"))?;

    match hat.identified_variant() {
        Some(variant) => {
            hat.register_power_off(|| info!("Power button pressed"))?;
            if variant == HatVariant::Pro {
                hat.register_battery_changed(|| info!("Battery level changed"))?;
            }
            info!("Watching {} hat, press Ctrl-C to stop", variant);
        }
        None => warn!("No hat attached; watching for attach events only"),
    }

    for class in EventClass::ALL {
        debug!(
            "{}: {} callbacks, hook {}",
            class,
            hat.callback_count(class),
            if hat.is_hook_installed(class) { "armed" } else { "idle" }
        );
    }

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Stopping");
    Ok(ExitCode::SUCCESS)
}
