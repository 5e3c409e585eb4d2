//! Heartbeat and shutdown-detection state machine.
//!
//! The UPS controller clocks the daemon over one GPIO line and watches a
//! second, bidirectional line. Toggling that line on every clock tick
//! proves the host is alive and keeps the controller's watchdog from
//! power-cycling it. Between toggles the same physical line is sampled as
//! an input with pull-up: the controller pulls it low to request a host
//! shutdown, avoiding a third wire.
//!
//! The whole transition runs under a single mutex. The handler is the
//! only reader and writer of the pin, but must still be serialized
//! against re-entrant edges when it is slow. In particular the 2-second
//! grace wait before power-off happens while the mutex is held: once a
//! shutdown is committed no further heartbeat toggle may interleave.

use crate::constants::SHUTDOWN_GRACE_MS;
use crate::history::HistoryRecorder;
use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// The bidirectional heartbeat pin.
///
/// Pin operations are infallible: an electrical-level failure is not
/// recoverable by software. Production code backs this with a Raspberry
/// Pi GPIO pin that can switch direction at runtime.
pub trait PulseLine: Send {
    /// Level the pin is currently driving (pin still configured as output).
    fn output_level(&self) -> bool;
    /// Drive the pin to `level` while configured as output.
    fn drive(&mut self, level: bool);
    /// Reconfigure the pin as an input with pull-up.
    fn to_input_pullup(&mut self);
    /// Sample the pin while configured as input.
    fn sample(&self) -> bool;
    /// Reconfigure the pin as an output driving `initial`.
    fn to_output(&mut self, initial: bool);
}

/// The opaque host power-off action.
pub trait ShutdownAction: Send + Sync {
    fn power_off(&self);
}

/// Pin handle and the logical level it is (or is about to be) driving.
/// Mutated only inside the critical section.
struct PulseState {
    pin: Box<dyn PulseLine>,
    level: bool,
}

/// Interrupt-driven heartbeat/shutdown-detect protocol over a single pin.
pub struct PulseProtocol {
    state: Mutex<PulseState>,
    shutdown: Box<dyn ShutdownAction>,
    shutdown_fired: AtomicBool,
    history: Arc<HistoryRecorder>,
    grace: Duration,
}

impl PulseProtocol {
    /// Arm the protocol: the pin is configured as an output driving high
    /// so the controller's watchdog is satisfied from the start.
    pub fn new(
        pin: Box<dyn PulseLine>,
        shutdown: Box<dyn ShutdownAction>,
        history: Arc<HistoryRecorder>,
    ) -> Self {
        Self::with_grace(
            pin,
            shutdown,
            history,
            Duration::from_millis(SHUTDOWN_GRACE_MS),
        )
    }

    /// Arm with an explicit grace period (tests use zero).
    pub fn with_grace(
        mut pin: Box<dyn PulseLine>,
        shutdown: Box<dyn ShutdownAction>,
        history: Arc<HistoryRecorder>,
        grace: Duration,
    ) -> Self {
        pin.to_output(true);
        PulseProtocol {
            state: Mutex::new(PulseState { pin, level: true }),
            shutdown,
            shutdown_fired: AtomicBool::new(false),
            history,
            grace,
        }
    }

    /// Service one accepted falling edge of the clock line.
    ///
    /// Debounce and foreign-pin filtering happen at interrupt
    /// registration; every call here is a genuine controller tick.
    pub fn on_clock_edge(&self) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Capture the level the pin was last driving before the direction
        // switch; the next tick drives its inverse.
        let next_level = !state.pin.output_level();

        // Low before switching direction, then hand the line to the
        // controller: with the pull-up it idles high and the controller
        // pulls it low to request a shutdown.
        state.pin.drive(false);
        state.pin.to_input_pullup();

        if !state.pin.sample() {
            self.handle_shutdown_request();
        }

        // Re-drive the line even when a shutdown was just committed; the
        // controller keeps clocking until power actually drops.
        state.pin.to_output(next_level);
        state.level = next_level;
    }

    /// Logical level currently driven on the pulse pin.
    pub fn pulse_level(&self) -> bool {
        match self.state.lock() {
            Ok(guard) => guard.level,
            Err(poisoned) => poisoned.into_inner().level,
        }
    }

    /// Whether the host power-off has been committed.
    pub fn shutdown_committed(&self) -> bool {
        self.shutdown_fired.load(Ordering::SeqCst)
    }

    /// Called with the pin mutex held. The grace wait deliberately keeps
    /// the mutex: no heartbeat toggle may happen between detection and
    /// power-off. At most one power-off per process lifetime.
    fn handle_shutdown_request(&self) {
        if self.shutdown_fired.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!("The UPS requests shutdown of the host");
        // A history failure must never block the shutdown sequence; the
        // recorder swallows write errors itself.
        self.history
            .record_event("The UPS commands the shutdown of the host.");
        thread::sleep(self.grace);
        self.shutdown.power_off();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Copy, PartialEq, Debug)]
    enum PinMode {
        Output,
        InputPullup,
    }

    struct MockPinState {
        mode: PinMode,
        driven: bool,
        /// The controller holding the line low.
        external_low: bool,
    }

    #[derive(Clone)]
    struct MockLine {
        inner: Arc<Mutex<MockPinState>>,
    }

    impl MockLine {
        fn new() -> Self {
            MockLine {
                inner: Arc::new(Mutex::new(MockPinState {
                    mode: PinMode::Output,
                    driven: false,
                    external_low: false,
                })),
            }
        }

        fn assert_output_at(&self, level: bool) {
            let st = self.inner.lock().unwrap();
            assert_eq!(st.mode, PinMode::Output);
            assert_eq!(st.driven, level);
        }

        fn pull_low(&self) {
            self.inner.lock().unwrap().external_low = true;
        }
    }

    impl PulseLine for MockLine {
        fn output_level(&self) -> bool {
            self.inner.lock().unwrap().driven
        }

        fn drive(&mut self, level: bool) {
            self.inner.lock().unwrap().driven = level;
        }

        fn to_input_pullup(&mut self) {
            self.inner.lock().unwrap().mode = PinMode::InputPullup;
        }

        fn sample(&self) -> bool {
            let st = self.inner.lock().unwrap();
            // Pull-up keeps the line high unless the controller sinks it.
            !st.external_low
        }

        fn to_output(&mut self, initial: bool) {
            let mut st = self.inner.lock().unwrap();
            st.mode = PinMode::Output;
            st.driven = initial;
        }
    }

    #[derive(Clone)]
    struct CountingShutdown {
        count: Arc<AtomicUsize>,
    }

    impl CountingShutdown {
        fn new() -> Self {
            CountingShutdown {
                count: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl ShutdownAction for CountingShutdown {
        fn power_off(&self) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn protocol(line: MockLine, shutdown: CountingShutdown, dir: &std::path::Path) -> PulseProtocol {
        PulseProtocol::with_grace(
            Box::new(line),
            Box::new(shutdown),
            Arc::new(HistoryRecorder::new(dir)),
            Duration::ZERO,
        )
    }

    #[test]
    fn arms_pin_high() {
        let dir = tempfile::tempdir().unwrap();
        let line = MockLine::new();
        let proto = protocol(line.clone(), CountingShutdown::new(), dir.path());
        line.assert_output_at(true);
        assert!(proto.pulse_level());
    }

    #[test]
    fn level_toggles_once_per_edge() {
        let dir = tempfile::tempdir().unwrap();
        let line = MockLine::new();
        let proto = protocol(line.clone(), CountingShutdown::new(), dir.path());

        proto.on_clock_edge();
        assert!(!proto.pulse_level());
        line.assert_output_at(false);

        proto.on_clock_edge();
        assert!(proto.pulse_level());
        line.assert_output_at(true);

        proto.on_clock_edge();
        assert!(!proto.pulse_level());
    }

    #[test]
    fn quiet_line_never_shuts_down() {
        let dir = tempfile::tempdir().unwrap();
        let line = MockLine::new();
        let shutdown = CountingShutdown::new();
        let proto = protocol(line, shutdown.clone(), dir.path());

        for _ in 0..50 {
            proto.on_clock_edge();
        }
        assert_eq!(shutdown.count.load(Ordering::SeqCst), 0);
        assert!(!proto.shutdown_committed());
    }

    #[test]
    fn low_sample_fires_shutdown_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let line = MockLine::new();
        let shutdown = CountingShutdown::new();
        let proto = protocol(line.clone(), shutdown.clone(), dir.path());

        line.pull_low();
        for _ in 0..10 {
            proto.on_clock_edge();
        }
        assert_eq!(shutdown.count.load(Ordering::SeqCst), 1);
        assert!(proto.shutdown_committed());
    }

    #[test]
    fn shutdown_event_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let line = MockLine::new();
        let proto = protocol(line.clone(), CountingShutdown::new(), dir.path());

        line.pull_low();
        proto.on_clock_edge();

        let contents =
            std::fs::read_to_string(dir.path().join(crate::history::EVENT_LOG)).unwrap();
        assert!(contents.contains("commands the shutdown"));
    }

    #[test]
    fn pin_reconfigured_as_output_after_shutdown_detection() {
        let dir = tempfile::tempdir().unwrap();
        let line = MockLine::new();
        let proto = protocol(line.clone(), CountingShutdown::new(), dir.path());

        line.pull_low();
        proto.on_clock_edge();
        // The reconfiguration still executes even though the host is on
        // its way down; the armed-high level inverts to low.
        line.assert_output_at(false);
    }

    #[test]
    fn toggling_continues_after_committed_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let line = MockLine::new();
        let shutdown = CountingShutdown::new();
        let proto = protocol(line.clone(), shutdown.clone(), dir.path());

        line.pull_low();
        proto.on_clock_edge();
        let after_first = proto.pulse_level();
        proto.on_clock_edge();
        assert_ne!(proto.pulse_level(), after_first);
        assert_eq!(shutdown.count.load(Ordering::SeqCst), 1);
    }
}
