//! Configuration loading and clamping.
//!
//! The configuration file is a flat `KEY = value` text file with `#`
//! comment lines. A missing file is created with a commented default
//! template. Every numeric field is clamped to its documented bounds at
//! load time; out-of-range input is silently corrected and the corrected
//! value is written back to the file so the operator sees what is
//! actually in effect.

use crate::constants::*;
use crate::error::Result;
use crate::types::ShutdownDelay;
use log::warn;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Default configuration file written when none exists.
const DEFAULT_CONFIG_TEMPLATE: &str = "\
# Configuration for the piguard daemon
# Shutdown delay time before power-off (from 1-180 in minutes, from 181 to 235 in hours, e.g., 181=4hrs, 182=5hrs ... 235=58hrs)
SHUTDOWN_DELAY = 60

# WATCHDOG. The host has frozen (in minutes) before power-off warning (3-10). It cannot be set to less than 3 minutes because, if the UPS is connected, it will cause rapid reboots, making it impossible to fix any installation issues remotely.
WATCHDOG_RPI = 5

# Waiting time (in seconds) within the main loop (1-20). Be careful not to overload the system.
LOOP_RUN_UPS = 5

# Time after shutdown signal (in seconds) for the host to finish its processes before disconnecting power (10-254)
POST_SHUTDOWN = 30

# Data read frequency for writing the log, in seconds (20-3600)
FREC_HISTORY = 60

# Enable/disable sending I2C commands (True/False). Only disable if you want to take control of the UPS using I2C commands from another program.
I2C_SEND_ENABLED = True
";

/// Validated, clamped operating parameters.
///
/// Built once at startup and immutable thereafter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    /// Delay before the UPS cuts power after mains loss (minutes, or an
    /// hours encoding at 181 and above)
    pub shutdown_delay: u8,
    /// UPS-side watchdog timeout for a frozen host (minutes)
    pub watchdog_timeout: u8,
    /// Sleep between polling loop iterations (seconds)
    pub loop_interval: u8,
    /// Time the UPS keeps power on after the shutdown signal (seconds)
    pub post_shutdown_grace: u8,
    /// Minimum interval between history sample writes (seconds)
    pub history_frequency: f64,
    /// Whether I2C commands are sent at all
    pub serial_push_enabled: bool,
}

impl Default for ParameterSet {
    fn default() -> Self {
        ParameterSet {
            shutdown_delay: 60,
            watchdog_timeout: 5,
            loop_interval: 5,
            post_shutdown_grace: 30,
            history_frequency: 60.0,
            serial_push_enabled: true,
        }
    }
}

impl ParameterSet {
    /// Load parameters from `path`, creating the file with defaults if it
    /// does not exist. Out-of-range values are clamped and the corrected
    /// file is written back with comments preserved.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(path, fs::Permissions::from_mode(0o666))?;
            }
        }

        let contents = fs::read_to_string(path)?;
        let vars = parse_vars(&contents);
        let params = Self::from_vars(&vars);
        params.write_back(path, &contents)?;
        Ok(params)
    }

    /// Build a clamped parameter set from raw key/value pairs. Missing or
    /// unparseable entries fall back to their defaults.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let defaults = ParameterSet::default();
        ParameterSet {
            shutdown_delay: clamp_int(
                vars.get("SHUTDOWN_DELAY"),
                defaults.shutdown_delay,
                MIN_SHUTDOWN_DELAY,
                MAX_SHUTDOWN_DELAY,
            ),
            watchdog_timeout: clamp_int(
                vars.get("WATCHDOG_RPI"),
                defaults.watchdog_timeout,
                MIN_WATCHDOG_RPI,
                MAX_WATCHDOG_RPI,
            ),
            loop_interval: clamp_int(
                vars.get("LOOP_RUN_UPS"),
                defaults.loop_interval,
                MIN_LOOP_RUN_UPS,
                MAX_LOOP_RUN_UPS,
            ),
            post_shutdown_grace: clamp_int(
                vars.get("POST_SHUTDOWN"),
                defaults.post_shutdown_grace,
                MIN_POST_SHUTDOWN,
                MAX_POST_SHUTDOWN,
            ),
            history_frequency: clamp_float(
                vars.get("FREC_HISTORY"),
                defaults.history_frequency,
                MIN_FREC_HISTORY,
                MAX_FREC_HISTORY,
            ),
            serial_push_enabled: vars
                .get("I2C_SEND_ENABLED")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(true),
        }
    }

    /// Human-readable interpretation of the shutdown delay.
    pub fn shutdown_delay_display(&self) -> ShutdownDelay {
        ShutdownDelay::from_raw(self.shutdown_delay)
    }

    /// Current value for a configuration key, formatted for the file.
    fn value_for_key(&self, key: &str) -> Option<String> {
        match key {
            "SHUTDOWN_DELAY" => Some(self.shutdown_delay.to_string()),
            "WATCHDOG_RPI" => Some(self.watchdog_timeout.to_string()),
            "LOOP_RUN_UPS" => Some(self.loop_interval.to_string()),
            "POST_SHUTDOWN" => Some(self.post_shutdown_grace.to_string()),
            "FREC_HISTORY" => Some(format_frequency(self.history_frequency)),
            "I2C_SEND_ENABLED" => Some(
                if self.serial_push_enabled { "True" } else { "False" }.to_string(),
            ),
            _ => None,
        }
    }

    /// Rewrite the config file with clamped values, keeping comment and
    /// blank lines untouched.
    fn write_back(&self, path: &Path, original: &str) -> Result<()> {
        let mut out = String::with_capacity(original.len());
        for line in original.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('#') || trimmed.is_empty() {
                out.push_str(line);
                out.push('\n');
                continue;
            }
            match trimmed.split_once('=') {
                Some((key, value)) => {
                    let key = key.trim();
                    let value = self
                        .value_for_key(key)
                        .unwrap_or_else(|| value.trim().to_string());
                    out.push_str(&format!("{} = {}\n", key, value));
                }
                None => {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        fs::write(path, out)?;
        Ok(())
    }
}

/// Parse `KEY = value` lines, skipping comments and blanks.
fn parse_vars(contents: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') || trimmed.is_empty() {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once('=') {
            vars.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    vars
}

fn clamp_int(raw: Option<&String>, default: u8, min: u8, max: u8) -> u8 {
    let value = match raw {
        Some(s) => match s.parse::<i64>() {
            Ok(v) => v,
            Err(_) => {
                warn!("Unparseable config value {:?}, using default {}", s, default);
                default as i64
            }
        },
        None => default as i64,
    };
    value.clamp(min as i64, max as i64) as u8
}

fn clamp_float(raw: Option<&String>, default: f64, min: f64, max: f64) -> f64 {
    let value = match raw {
        Some(s) => match s.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                warn!("Unparseable config value {:?}, using default {}", s, default);
                default
            }
        },
        None => default,
    };
    value.clamp(min, max)
}

/// Write the frequency without a trailing ".0" when it is whole, matching
/// the hand-edited style of the file.
fn format_frequency(freq: f64) -> String {
    if freq.fract() == 0.0 {
        format!("{}", freq as u64)
    } else {
        format!("{}", freq)
    }
}
