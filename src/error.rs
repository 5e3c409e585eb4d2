//! Error types for guard daemon operations.

use thiserror::Error;

/// Result type alias for guard operations.
pub type Result<T> = std::result::Result<T, GuardError>;

/// Error types for UPS supervision.
#[derive(Error, Debug)]
pub enum GuardError {
    /// I2C bus access failed
    #[error("I2C bus error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    /// GPIO pin access or configuration failed
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be interpreted
    #[error("Config error: {0}")]
    Config(String),

    /// History file append failed
    #[error("History write failed: {0}")]
    HistoryWrite(#[source] std::io::Error),
}
