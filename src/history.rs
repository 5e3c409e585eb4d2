//! Append-only history logging.
//!
//! Two logical logs live under the history directory: a power-event log
//! for startup, shutdown-request and mode-change events, and a sample log
//! receiving every recorded voltage/mode pair. Files are opened and
//! closed per write so external log rotation stays safe. A failed append
//! is logged to the process diagnostic stream and otherwise ignored; it
//! never halts the caller.

use crate::error::{GuardError, Result};
use crate::types::SampleRecord;
use chrono::{DateTime, Local};
use log::error;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Power-event log file name
pub const EVENT_LOG: &str = "UPS_History_POWER.dbg";

/// Periodic sample log file name
pub const SAMPLE_LOG: &str = "UPS_History.dbg";

/// Appends timestamped lines to the history logs.
pub struct HistoryRecorder {
    dir: PathBuf,
}

impl HistoryRecorder {
    /// Create a recorder writing under `dir`. The directory itself must
    /// already exist; the log files are created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        HistoryRecorder { dir: dir.into() }
    }

    /// Append a free-text line to the power-event log, stamped "now".
    pub fn record_event(&self, text: &str) {
        self.record_event_at(Local::now(), text);
    }

    /// Append a free-text line to the power-event log with an explicit
    /// timestamp (used for the boot-time startup entry).
    pub fn record_event_at(&self, when: DateTime<Local>, text: &str) {
        if let Err(e) = self.append(EVENT_LOG, when, text) {
            error!("Error writing to {}: {}", EVENT_LOG, e);
        }
    }

    /// Append a voltage/mode line to the sample log.
    pub fn record_sample(&self, sample: &SampleRecord) {
        if let Err(e) = self.append(SAMPLE_LOG, sample.timestamp, &sample_text(sample)) {
            error!("Error writing to {}: {}", SAMPLE_LOG, e);
        }
    }

    /// Append a voltage/mode line to the power-event log, used when the
    /// operating mode changed since the previous recording.
    pub fn record_mode_change(&self, sample: &SampleRecord) {
        if let Err(e) = self.append(EVENT_LOG, sample.timestamp, &sample_text(sample)) {
            error!("Error writing to {}: {}", EVENT_LOG, e);
        }
    }

    /// Path of a log file under the history directory.
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn append(&self, name: &str, when: DateTime<Local>, text: &str) -> Result<()> {
        let path = self.dir.join(name);
        append_line(&path, when, text).map_err(GuardError::HistoryWrite)
    }
}

fn append_line(path: &Path, when: DateTime<Local>, text: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    writeln!(file, "{}\t{}", format_stamp(when), text)
}

fn sample_text(sample: &SampleRecord) -> String {
    format!(
        "Voltage: {:.1}[V]\t\tMode: {}",
        sample.voltage_volts, sample.mode
    )
}

/// `DD-MM-YYYY HH:MM:SS.mmm` timestamp used on every history line.
fn format_stamp(when: DateTime<Local>) -> String {
    when.format("%d-%m-%Y %H:%M:%S%.3f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(volts: f64, mode: u8) -> SampleRecord {
        SampleRecord {
            timestamp: Local.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap(),
            voltage_volts: volts,
            mode,
        }
    }

    #[test]
    fn event_line_has_stamp_and_tab() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = HistoryRecorder::new(dir.path());
        recorder.record_event("The host has started.");

        let contents = std::fs::read_to_string(recorder.log_path(EVENT_LOG)).unwrap();
        let line = contents.lines().next().unwrap();
        let (stamp, text) = line.split_once('\t').unwrap();
        // DD-MM-YYYY HH:MM:SS.mmm
        assert_eq!(stamp.len(), 23);
        assert_eq!(text, "The host has started.");
    }

    #[test]
    fn sample_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = HistoryRecorder::new(dir.path());
        recorder.record_sample(&sample(4.86, 1));

        let contents = std::fs::read_to_string(recorder.log_path(SAMPLE_LOG)).unwrap();
        assert!(contents.contains("30-08-2026 12:00:00.000\tVoltage: 4.9[V]\t\tMode: 1"));
    }

    #[test]
    fn mode_change_goes_to_event_log() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = HistoryRecorder::new(dir.path());
        recorder.record_mode_change(&sample(5.0, 2));

        assert!(recorder.log_path(EVENT_LOG).exists());
        assert!(!recorder.log_path(SAMPLE_LOG).exists());
    }

    #[test]
    fn appends_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = HistoryRecorder::new(dir.path());
        recorder.record_event("first");
        recorder.record_event("second");

        let contents = std::fs::read_to_string(recorder.log_path(EVENT_LOG)).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn write_failure_does_not_panic() {
        // Point the recorder at a directory that does not exist.
        let recorder = HistoryRecorder::new("/nonexistent/piguard-test");
        recorder.record_event("dropped");
        recorder.record_sample(&sample(1.0, 0));
    }
}
