//! # piguard
//!
//! A power-guard daemon supervising a UPS controller attached to a
//! Raspberry Pi over two hardware paths: a GPIO clock/pulse pin pair and
//! an I2C command bus.
//!
//! ## Responsibilities
//!
//! - Maintain the heartbeat protocol that proves host liveness and keeps
//!   the controller's watchdog from power-cycling the host
//! - Detect a shutdown request asserted on the heartbeat line and execute
//!   an orderly host shutdown
//! - Push operating parameters (shutdown delay, watchdog timeout,
//!   post-shutdown grace) to the controller at startup
//! - Sample battery voltage and power mode and persist a history log
//!
//! ## Example
//!
//! ```no_run
//! use piguard::{ParameterSet, UpsLink};
//! use piguard::hal::I2cBus;
//!
//! fn main() -> piguard::Result<()> {
//!     let params = ParameterSet::load(std::path::Path::new("piguard_config.txt"))?;
//!     let mut link = UpsLink::new(Box::new(I2cBus::open()?));
//!     link.push_shutdown_delay(params.shutdown_delay);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod hal;
pub mod history;
pub mod pulse;
pub mod supervisor;
pub mod types;
pub mod ups;

pub use config::ParameterSet;
pub use error::{GuardError, Result};
pub use history::HistoryRecorder;
pub use pulse::PulseProtocol;
pub use supervisor::Supervisor;
pub use types::*;
pub use ups::UpsLink;
