//! piguard daemon entry point.
//!
//! Wires the hardware bindings to the pulse protocol and supervisor,
//! installs signal handlers and runs the polling loop until terminated.
//!
//! Set `RUST_LOG` to override the `--log-level` default:
//!   RUST_LOG=debug piguard --config /srv/ups/piguard_config.txt

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use clap::Parser;
use log::{error, info};
use piguard::config::ParameterSet;
use piguard::hal::{self, GpioPulseLine, HostShutdown, I2cBus};
use piguard::history::HistoryRecorder;
use piguard::pulse::PulseProtocol;
use piguard::supervisor::Supervisor;
use piguard::ups::UpsLink;
use piguard::Result;
use rppal::gpio::Gpio;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "piguard", version, about = "UPS power-guard daemon for Raspberry Pi")]
struct Cli {
    /// Path to the piguard configuration file; history logs are written
    /// next to it
    #[arg(short, long, default_value = "/usr/local/etc/piguard_config.txt")]
    config: PathBuf,

    /// Log level filter used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&cli.log_level),
    )
    .init();

    if let Err(e) = run(&cli) {
        error!("Fatal initialization error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let params = ParameterSet::load(&cli.config)?;
    let home_dir = cli.config.parent().unwrap_or(Path::new("."));
    let history = Arc::new(HistoryRecorder::new(home_dir));
    history.record_event_at(boot_timestamp(), "The host has started.");

    let gpio = Gpio::new()?;
    let link = UpsLink::new(Box::new(I2cBus::open()?));

    let pulse = Arc::new(PulseProtocol::new(
        Box::new(GpioPulseLine::open(&gpio)?),
        Box::new(HostShutdown),
        Arc::clone(&history),
    ));
    // The clock pin must outlive the loop or interrupts stop arriving.
    let _clock = hal::arm_clock_interrupt(&gpio, Arc::clone(&pulse))?;
    info!(
        "Armed heartbeat on BCM {} with clock on BCM {}",
        piguard::constants::PULSE_PIN,
        piguard::constants::CLOCK_PIN
    );

    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&term))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&term))?;

    let mut supervisor = Supervisor::new(params, link, history, term);
    supervisor.startup();
    supervisor.run();

    // Dropping the GPIO handles resets the pins on the way out.
    info!("Cleaning up GPIO pins...");
    Ok(())
}

/// Host boot time from `uptime -s`, falling back to "now" when the
/// command is unavailable or unparseable.
fn boot_timestamp() -> DateTime<Local> {
    Command::new("uptime")
        .arg("-s")
        .output()
        .ok()
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .and_then(|s| NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S").ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .unwrap_or_else(Local::now)
}
