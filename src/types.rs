use crate::constants::{SHUTDOWN_DELAY_HOURS_FROM, SHUTDOWN_DELAY_HOURS_OFFSET};
use chrono::{DateTime, Local};
use std::fmt;

/// One voltage/mode reading taken from the UPS controller.
///
/// Produced by the polling loop and consumed immediately by the history
/// recorder; not retained.
#[derive(Debug, Clone)]
pub struct SampleRecord {
    pub timestamp: DateTime<Local>,
    pub voltage_volts: f64,
    pub mode: u8,
}

/// Outcome of feeding one reading through the history cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleDecision {
    /// The sampling period has elapsed and a sample line should be written
    pub write_sample: bool,
    /// The operating mode differs from the last recorded one
    pub mode_changed: bool,
}

/// Human-readable interpretation of a shutdown delay value.
///
/// Values below 181 are minutes; 181 and above encode hours as
/// `value - 177` (181 = 4 hrs, 235 = 58 hrs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownDelay {
    Minutes(u8),
    Hours(u8),
}

impl ShutdownDelay {
    /// Interpret a raw (already clamped) shutdown delay byte.
    pub fn from_raw(raw: u8) -> Self {
        if raw >= SHUTDOWN_DELAY_HOURS_FROM {
            ShutdownDelay::Hours(raw - SHUTDOWN_DELAY_HOURS_OFFSET)
        } else {
            ShutdownDelay::Minutes(raw)
        }
    }
}

impl fmt::Display for ShutdownDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownDelay::Minutes(m) => write!(f, "{} [min]", m),
            ShutdownDelay::Hours(h) => write!(f, "{} [hrs]", h),
        }
    }
}
