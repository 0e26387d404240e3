//! litra-deck CLI: command-line control of Litra Glow and Beam lights.

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use litra_deck_core::comm::ErrorClass;
use litra_deck_core::poll::{PollConfig, PowerPoller};
use litra_deck_core::registry::{BatchOutcome, Operation};
use litra_deck_core::state::{reconcile_aggregate, PollOutcome};
use litra_deck_core::{AggregatePower, DeviceType, PowerState, Registry, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const NO_DEVICES_MESSAGE: &str = "No devices connected.\nEnsure your Litra light is plugged in and has HID access.";

fn parse_device_type(s: &str) -> Result<DeviceType, String> {
    DeviceType::from_name(s).ok_or_else(|| format!("unknown device type '{s}' (glow, beam, all)"))
}

#[derive(Parser)]
#[command(
    name = "litra-deck",
    version,
    about = "Control Logitech Litra Glow and Beam lights"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Which lights a command targets.
#[derive(Args)]
struct Target {
    /// Device path (see `list`); omit to target every light of --type.
    #[arg(long)]
    device: Option<String>,
    /// Device type filter: glow, beam, or all.
    #[arg(long = "type", value_parser = parse_device_type, default_value = "all")]
    device_type: DeviceType,
}

impl Target {
    fn selector(&self) -> Selector {
        Selector::from_value(self.device.as_deref(), self.device_type)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List connected Litra lights.
    List {
        #[arg(long = "type", value_parser = parse_device_type, default_value = "all")]
        device_type: DeviceType,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Show the device selection options a button would offer.
    Options {
        #[arg(long = "type", value_parser = parse_device_type, default_value = "all")]
        device_type: DeviceType,
    },
    /// Turn lights on.
    On(Target),
    /// Turn lights off.
    Off(Target),
    /// Set brightness (1-100 %).
    Brightness {
        percent: u16,
        #[command(flatten)]
        target: Target,
    },
    /// Set color temperature (2700-6500 K).
    Temperature {
        kelvin: u16,
        #[command(flatten)]
        target: Target,
    },
    /// Step brightness by a signed percentage, starting from 50 %.
    StepBrightness {
        #[arg(allow_hyphen_values = true)]
        delta: i32,
        #[command(flatten)]
        target: Target,
    },
    /// Step color temperature by signed Kelvin, starting from 4500 K.
    StepTemperature {
        #[arg(allow_hyphen_values = true)]
        delta: i32,
        #[command(flatten)]
        target: Target,
    },
    /// Query power state.
    Status {
        #[command(flatten)]
        target: Target,
        /// Believed state to reconcile against.
        #[arg(long)]
        believed: bool,
    },
    /// Poll power state periodically.
    Watch {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        believed: bool,
        /// Seconds between polls.
        #[arg(long, default_value_t = 5)]
        interval: u64,
        /// Stop after this many seconds.
        #[arg(long, default_value_t = 30)]
        duration: u64,
    },
}

fn report(outcome: BatchOutcome, what: &str) -> Result<()> {
    if outcome.is_empty() {
        println!("{NO_DEVICES_MESSAGE}");
        return Ok(());
    }
    println!("{what}: {}/{} light(s)", outcome.succeeded, outcome.attempted);
    if outcome.succeeded == 0 {
        bail!("no light accepted the command (run with RUST_LOG=debug for details)");
    }
    Ok(())
}

fn describe(power: AggregatePower) -> &'static str {
    match power {
        AggregatePower::NoDevices => "no devices",
        AggregatePower::On => "on",
        AggregatePower::Off => "off",
        AggregatePower::Unknown => "unknown",
    }
}

fn watch(registry: Registry, target: &Target, believed: bool, interval: u64, duration: u64) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    info!(interval, duration, believed, "Watching power state");
    runtime.block_on(async {
        let handle = PowerPoller::spawn(
            Arc::new(registry),
            target.selector(),
            believed,
            PollConfig {
                interval: Duration::from_secs(interval.max(1)),
            },
            |outcome| match outcome {
                PollOutcome::NoDevices => println!("{NO_DEVICES_MESSAGE}"),
                PollOutcome::Reconciled(r) => println!(
                    "{}{}",
                    if r.is_on { "on" } else { "off" },
                    if r.persist { " (corrected)" } else { "" }
                ),
            },
        );
        tokio::time::sleep(Duration::from_secs(duration)).await;
        handle.shutdown().await;
    });
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let registry = match Registry::with_hidapi() {
        Ok(registry) => registry,
        Err(e) => {
            if let Some(hint) = ErrorClass::classify(&e).hint() {
                eprintln!("hint: {hint}");
            }
            return Err(e.into());
        }
    };

    match cli.command {
        Commands::List { device_type, json } => {
            let devices = registry.list_devices(device_type);
            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else if devices.is_empty() {
                println!("{NO_DEVICES_MESSAGE}");
            } else {
                for dev in &devices {
                    println!(
                        "Litra {} ({}, VID: 0x{:04X}, PID: 0x{:04X}, path: {})",
                        dev.model,
                        dev.product.as_deref().unwrap_or("Unknown"),
                        dev.vendor_id,
                        dev.product_id,
                        dev.path
                    );
                }
            }
        }
        Commands::Options { device_type } => {
            let options = registry.list_device_options(device_type);
            println!("{}", serde_json::to_string_pretty(&options)?);
        }
        Commands::On(target) => {
            report(registry.apply_selected(&target.selector(), Operation::PowerOn), "Turned on")?;
        }
        Commands::Off(target) => {
            report(registry.apply_selected(&target.selector(), Operation::PowerOff), "Turned off")?;
        }
        Commands::Brightness { percent, target } => {
            litra_deck_core::safety::validate_brightness(percent)?;
            report(
                registry.apply_selected(&target.selector(), Operation::Brightness(percent)),
                &format!("Brightness set to {percent}%"),
            )?;
        }
        Commands::Temperature { kelvin, target } => {
            litra_deck_core::safety::validate_temperature(kelvin)?;
            report(
                registry.apply_selected(&target.selector(), Operation::Temperature(kelvin)),
                &format!("Temperature set to {kelvin}K"),
            )?;
        }
        Commands::StepBrightness { delta, target } => {
            report(
                registry.step_brightness(&target.selector(), delta),
                &format!("Brightness stepped by {delta:+}%"),
            )?;
        }
        Commands::StepTemperature { delta, target } => {
            report(
                registry.step_temperature(&target.selector(), delta),
                &format!("Temperature stepped by {delta:+}K"),
            )?;
        }
        Commands::Status { target, believed } => {
            let selector = target.selector();
            let queried = registry.query(&selector);
            if queried.is_empty() {
                println!("{NO_DEVICES_MESSAGE}");
                return Ok(());
            }
            for (device, state) in &queried {
                let state = match state.as_bool() {
                    Some(true) => "on",
                    Some(false) => "off",
                    None => "unknown",
                };
                println!("{} {}: {state}", device.model, device.path);
            }
            let states: Vec<PowerState> = queried.iter().map(|(_, state)| *state).collect();
            let power = selector.combine(&states);
            println!("Aggregate: {}", describe(power));
            if let PollOutcome::Reconciled(r) = reconcile_aggregate(believed, power) {
                println!(
                    "Display: {}{}",
                    if r.is_on { "on" } else { "off" },
                    if r.persist { " (belief corrected)" } else { "" }
                );
            }
        }
        Commands::Watch {
            target,
            believed,
            interval,
            duration,
        } => watch(registry, &target, believed, interval, duration)?,
    }

    Ok(())
}
