//! Serial command/response driver for the UPS controller.
//!
//! Every exchange is a single opcode byte followed, after a fixed settle
//! delay, by either a one-byte read (voltage, mode) or a one-byte value
//! write (parameter push). The controller offers no acknowledgement, so
//! parameter pushes are one-shot best effort. A bus fault is never fatal:
//! reads yield `None` and pushes log the failure, leaving the daemon to
//! carry on with degraded data.

use crate::constants::*;
use crate::error::Result;
use log::error;
use std::thread;
use std::time::Duration;

/// Byte-level access to the UPS bus at its fixed address.
///
/// Production code backs this with the Raspberry Pi I2C peripheral; tests
/// substitute a scripted bus.
pub trait UpsBus: Send {
    fn send_byte(&mut self, value: u8) -> Result<()>;
    fn receive_byte(&mut self) -> Result<u8>;
}

/// Request/response interface to the UPS controller.
pub struct UpsLink {
    bus: Box<dyn UpsBus>,
    settle: Duration,
}

impl UpsLink {
    /// Create a link with the standard settle delay.
    pub fn new(bus: Box<dyn UpsBus>) -> Self {
        Self::with_settle(bus, Duration::from_millis(SETTLE_DELAY_MS))
    }

    /// Create a link with an explicit settle delay (tests use zero).
    pub fn with_settle(bus: Box<dyn UpsBus>, settle: Duration) -> Self {
        UpsLink { bus, settle }
    }

    /// Read the raw battery voltage byte. Scaling by [`scale_voltage`] is
    /// the caller's responsibility. Returns `None` on a bus fault.
    pub fn read_voltage(&mut self) -> Option<u8> {
        match self.exchange(READ_VOLTAGE_CMD) {
            Ok(value) => Some(value),
            Err(e) => {
                error!("I/O error reading voltage: {}", e);
                None
            }
        }
    }

    /// Read the operating mode byte (battery vs. external power). The
    /// encoding is controller-defined and treated as opaque here.
    /// Returns `None` on a bus fault.
    pub fn read_mode(&mut self) -> Option<u8> {
        match self.exchange(READ_MODE_CMD) {
            Ok(value) => Some(value),
            Err(e) => {
                error!("I/O error reading mode: {}", e);
                None
            }
        }
    }

    /// Push the shutdown delay (minutes, or the hours encoding above 180).
    pub fn push_shutdown_delay(&mut self, value: u8) {
        if let Err(e) = self.push(SET_SHUTDOWN_TIME_CMD, value) {
            error!("I/O error writing shutdown time: {}", e);
        }
    }

    /// Push the watchdog timeout (minutes).
    pub fn push_watchdog_timeout(&mut self, minutes: u8) {
        if let Err(e) = self.push(SET_WATCHDOG_TIME_CMD, minutes) {
            error!("I/O error writing watchdog time: {}", e);
        }
    }

    /// Push the post-shutdown grace period (seconds).
    pub fn push_post_shutdown_grace(&mut self, seconds: u8) {
        if let Err(e) = self.push(SET_POST_SHUTDOWN_CMD, seconds) {
            error!("I/O error writing post shutdown time: {}", e);
        }
    }

    /// Opcode write, settle, one-byte read.
    fn exchange(&mut self, opcode: u8) -> Result<u8> {
        self.bus.send_byte(opcode)?;
        thread::sleep(self.settle);
        self.bus.receive_byte()
    }

    /// Opcode write, settle, value write.
    fn push(&mut self, opcode: u8, value: u8) -> Result<()> {
        self.bus.send_byte(opcode)?;
        thread::sleep(self.settle);
        self.bus.send_byte(value)
    }
}

/// Convert a raw voltage byte to volts.
pub fn scale_voltage(raw: u8) -> f64 {
    raw as f64 * VOLTAGE_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuardError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted bus: records every sent byte, pops queued read results.
    struct MockBus {
        sent: Arc<Mutex<Vec<u8>>>,
        reads: VecDeque<Result<u8>>,
        fail_sends: bool,
    }

    impl MockBus {
        fn new(reads: Vec<Result<u8>>) -> (Self, Arc<Mutex<Vec<u8>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            (
                MockBus {
                    sent: Arc::clone(&sent),
                    reads: reads.into_iter().collect(),
                    fail_sends: false,
                },
                sent,
            )
        }

        fn io_error() -> GuardError {
            GuardError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "bus glitch",
            ))
        }
    }

    impl UpsBus for MockBus {
        fn send_byte(&mut self, value: u8) -> Result<()> {
            if self.fail_sends {
                return Err(Self::io_error());
            }
            self.sent.lock().unwrap().push(value);
            Ok(())
        }

        fn receive_byte(&mut self) -> Result<u8> {
            self.reads.pop_front().unwrap_or_else(|| Err(Self::io_error()))
        }
    }

    fn link(bus: MockBus) -> UpsLink {
        UpsLink::with_settle(Box::new(bus), Duration::ZERO)
    }

    #[test]
    fn read_voltage_sends_opcode_and_returns_byte() {
        let (bus, sent) = MockBus::new(vec![Ok(243)]);
        let mut link = link(bus);
        assert_eq!(link.read_voltage(), Some(243));
        assert_eq!(*sent.lock().unwrap(), vec![READ_VOLTAGE_CMD]);
    }

    #[test]
    fn read_mode_sends_opcode() {
        let (bus, sent) = MockBus::new(vec![Ok(2)]);
        let mut link = link(bus);
        assert_eq!(link.read_mode(), Some(2));
        assert_eq!(*sent.lock().unwrap(), vec![READ_MODE_CMD]);
    }

    #[test]
    fn bus_fault_yields_unavailable() {
        let (bus, _) = MockBus::new(vec![Err(MockBus::io_error())]);
        let mut link = link(bus);
        assert_eq!(link.read_voltage(), None);
    }

    #[test]
    fn failed_send_yields_unavailable() {
        let (mut bus, _) = MockBus::new(vec![]);
        bus.fail_sends = true;
        let mut link = link(bus);
        assert_eq!(link.read_mode(), None);
    }

    #[test]
    fn parameter_push_writes_opcode_then_value() {
        let (bus, sent) = MockBus::new(vec![]);
        let mut link = link(bus);
        link.push_shutdown_delay(60);
        link.push_watchdog_timeout(5);
        link.push_post_shutdown_grace(30);
        assert_eq!(
            *sent.lock().unwrap(),
            vec![
                SET_SHUTDOWN_TIME_CMD,
                60,
                SET_WATCHDOG_TIME_CMD,
                5,
                SET_POST_SHUTDOWN_CMD,
                30,
            ]
        );
    }

    #[test]
    fn push_fault_is_swallowed() {
        let (mut bus, sent) = MockBus::new(vec![]);
        bus.fail_sends = true;
        let mut link = link(bus);
        link.push_shutdown_delay(60);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn voltage_scaling() {
        assert_eq!(scale_voltage(0), 0.0);
        assert!((scale_voltage(243) - 4.86).abs() < 1e-9);
    }
}
