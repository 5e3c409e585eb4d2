//! Protocol constants for UPS controller communication.
//!
//! This module defines the I2C command bytes, bus address, GPIO pin
//! assignments, timing parameters and configuration clamping bounds used
//! by the guard daemon.

/// Command byte: read battery voltage
pub const READ_VOLTAGE_CMD: u8 = 0x01;

/// Command byte: read operating mode (battery vs. external power)
pub const READ_MODE_CMD: u8 = 0x02;

/// Command byte: set shutdown delay
pub const SET_SHUTDOWN_TIME_CMD: u8 = 0x03;

/// Command byte: set host watchdog timeout
pub const SET_WATCHDOG_TIME_CMD: u8 = 0x04;

/// Command byte: set post-shutdown grace period
pub const SET_POST_SHUTDOWN_CMD: u8 = 0x05;

/// I2C address of the UPS controller
pub const UPS_I2C_ADDR: u16 = 0x20;

/// Delay between a command write and the following byte transfer,
/// giving the controller time to process the opcode
pub const SETTLE_DELAY_MS: u64 = 200;

/// Scale factor applied to the raw voltage byte (volts per unit)
pub const VOLTAGE_SCALE: f64 = 0.02;

/// BCM pin carrying the clock signal from the UPS (input, falling edge)
pub const CLOCK_PIN: u8 = 27;

/// BCM pin carrying the heartbeat pulse to the UPS (bidirectional)
pub const PULSE_PIN: u8 = 22;

/// Edges arriving faster than this are treated as contact bounce (ms)
pub const BOUNCE_TIME_MS: u64 = 30;

/// Grace period between shutdown detection and the host power-off command
pub const SHUTDOWN_GRACE_MS: u64 = 2000;

/// Time allowed for the controller to apply pushed parameters before the
/// polling loop starts (seconds)
pub const STARTUP_SETTLE_SECS: u64 = 15;

/// Shutdown delay lower bound (minutes)
pub const MIN_SHUTDOWN_DELAY: u8 = 1;

/// Shutdown delay upper bound
pub const MAX_SHUTDOWN_DELAY: u8 = 235;

/// First shutdown delay value interpreted as hours rather than minutes
pub const SHUTDOWN_DELAY_HOURS_FROM: u8 = 181;

/// Offset subtracted from an hours-encoded shutdown delay (181 = 4 hrs)
pub const SHUTDOWN_DELAY_HOURS_OFFSET: u8 = 177;

/// Host watchdog lower bound (minutes). Below 3 minutes a connected UPS
/// can reboot the host faster than a remote operator can intervene.
pub const MIN_WATCHDOG_RPI: u8 = 3;

/// Host watchdog upper bound (minutes)
pub const MAX_WATCHDOG_RPI: u8 = 10;

/// Main loop sleep lower bound (seconds)
pub const MIN_LOOP_RUN_UPS: u8 = 1;

/// Main loop sleep upper bound (seconds)
pub const MAX_LOOP_RUN_UPS: u8 = 20;

/// Post-shutdown grace lower bound (seconds)
pub const MIN_POST_SHUTDOWN: u8 = 10;

/// Post-shutdown grace upper bound (seconds)
pub const MAX_POST_SHUTDOWN: u8 = 254;

/// History sampling period lower bound (seconds)
pub const MIN_FREC_HISTORY: f64 = 20.0;

/// History sampling period upper bound (seconds)
pub const MAX_FREC_HISTORY: f64 = 3600.0;
