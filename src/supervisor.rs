//! Startup orchestration and the steady polling loop.
//!
//! The supervisor pushes operating parameters to the controller at
//! startup, then polls voltage and mode over the bus, gating history
//! writes on the configured sampling period. It never touches the
//! heartbeat pin; that belongs entirely to the interrupt-driven
//! [`crate::pulse::PulseProtocol`].

use crate::config::ParameterSet;
use crate::constants::STARTUP_SETTLE_SECS;
use crate::history::HistoryRecorder;
use crate::types::{SampleDecision, SampleRecord};
use crate::ups::{scale_voltage, UpsLink};
use chrono::Local;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Sampling cadence and mode-change deduplication bookkeeping.
///
/// Private to the polling loop, so no locking is needed.
pub struct HistoryCursor {
    frequency: Duration,
    last_write: Option<Instant>,
    last_mode: Option<u8>,
}

impl HistoryCursor {
    /// A fresh cursor writes immediately on the first observation.
    pub fn new(frequency: Duration) -> Self {
        HistoryCursor {
            frequency,
            last_write: None,
            last_mode: None,
        }
    }

    /// Feed one reading through the cadence gate. Mode-change detection
    /// only runs when the gate opens, so a mode flip inside the sampling
    /// window surfaces at the next gated write.
    pub fn observe(&mut self, now: Instant, mode: u8) -> SampleDecision {
        let due = match self.last_write {
            None => true,
            Some(at) => now.duration_since(at) >= self.frequency,
        };
        if !due {
            return SampleDecision {
                write_sample: false,
                mode_changed: false,
            };
        }
        self.last_write = Some(now);
        let mode_changed = self.last_mode != Some(mode);
        self.last_mode = Some(mode);
        SampleDecision {
            write_sample: true,
            mode_changed,
        }
    }
}

/// The daemon's polling half: parameter push, voltage/mode sampling,
/// history recording and lifecycle.
pub struct Supervisor {
    params: ParameterSet,
    link: UpsLink,
    history: Arc<HistoryRecorder>,
    cursor: HistoryCursor,
    /// Raised by the signal handlers; ends the loop.
    term: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(
        params: ParameterSet,
        link: UpsLink,
        history: Arc<HistoryRecorder>,
        term: Arc<AtomicBool>,
    ) -> Self {
        let cursor = HistoryCursor::new(Duration::from_secs_f64(params.history_frequency));
        Supervisor {
            params,
            link,
            history,
            cursor,
            term,
        }
    }

    /// Push the configured times to the controller (when enabled), record
    /// the applied values, then wait for the controller to take them up.
    pub fn startup(&mut self) {
        if self.params.serial_push_enabled {
            self.link.push_shutdown_delay(self.params.shutdown_delay);
            self.link.push_watchdog_timeout(self.params.watchdog_timeout);
            self.link
                .push_post_shutdown_grace(self.params.post_shutdown_grace);
            self.history.record_event(&format!(
                "Shutdown delay: {}, Watchdog: {} [min], Post shutdown: {} [s]",
                self.params.shutdown_delay_display(),
                self.params.watchdog_timeout,
                self.params.post_shutdown_grace,
            ));
            info!("Pushed operating parameters to the UPS controller");
        }
        thread::sleep(Duration::from_secs(STARTUP_SETTLE_SECS));
    }

    /// Steady loop: poll, record, sleep, until the termination flag drops.
    pub fn run(&mut self) {
        while !self.term.load(Ordering::SeqCst) {
            self.poll_once();
            thread::sleep(Duration::from_secs(self.params.loop_interval as u64));
        }
        info!("Stopping the piguard service...");
    }

    /// One polling iteration. A failed bus read skips the iteration; the
    /// loop continues on the next tick with degraded data.
    fn poll_once(&mut self) {
        if !self.params.serial_push_enabled {
            return;
        }
        let (Some(raw), Some(mode)) = (self.link.read_voltage(), self.link.read_mode()) else {
            return;
        };

        let sample = SampleRecord {
            timestamp: Local::now(),
            voltage_volts: scale_voltage(raw),
            mode,
        };
        debug!(
            "UPS sample: {:.2} V, mode {}",
            sample.voltage_volts, sample.mode
        );

        let decision = self.cursor.observe(Instant::now(), mode);
        if decision.write_sample {
            if decision.mode_changed {
                self.history.record_mode_change(&sample);
            }
            self.history.record_sample(&sample);
        }
    }
}
