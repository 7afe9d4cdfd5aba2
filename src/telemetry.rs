//! # Live Telemetry Store
//!
//! Shared state between the serial reader thread (single writer) and the
//! presentation refresh (any number of readers).
//!
//! ## Buffers
//! - Fast window: filtered signal plus the detection threshold, one slot per
//!   sample. The device only reports the current threshold, so the threshold
//!   series is a flat line at the latest value across all slots.
//! - Rate history: `(time, rate)` for each reading with rate > 0.
//! - Session log: every raw record since the connection started, for export.
//!
//! ## Rate of zero
//! The firmware sends `rate: 0` until it has seen enough breaths to compute
//! one. A zero clears the displayed rate and is never appended to history.
//!
//! Readers receive owned copies; nothing hands out the internal containers.

use crate::classifier::{BreathStatus, ThresholdConfig};
use crate::record::TelemetryRecord;
use crate::window::{RatePoint, RollingWindow};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

pub const FAST_WINDOW_CAPACITY: usize = 100;
pub const RATE_WINDOW_CAPACITY: usize = 60;

/// Latest values for the headline readouts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveReadings {
    /// Most recent nonzero rate; `None` until determined or after a 0 report
    pub rate: Option<f64>,
    pub breath_count: Option<u64>,
    pub status_label: Option<String>,
    pub status: BreathStatus,
    pub samples_received: u64,
}

/// Filtered signal and threshold series for the fast chart
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FastWindowSnapshot {
    pub filtered: Vec<f64>,
    pub threshold: Vec<f64>,
}

struct StoreState {
    readings: LiveReadings,
    filtered: RollingWindow<f64>,
    threshold: RollingWindow<f64>,
    rate_history: RollingWindow<RatePoint>,
    session: Vec<Value>,
}

pub struct TelemetryStore {
    state: Mutex<StoreState>,
    thresholds: ThresholdConfig,
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

impl TelemetryStore {
    pub fn new(fast_capacity: usize, rate_capacity: usize, thresholds: ThresholdConfig) -> Self {
        Self {
            state: Mutex::new(StoreState {
                readings: LiveReadings::default(),
                filtered: RollingWindow::new(fast_capacity),
                threshold: RollingWindow::new(fast_capacity),
                rate_history: RollingWindow::new(rate_capacity),
                session: Vec::new(),
            }),
            thresholds,
        }
    }

    // Poisoning is recovered: readers keep working after a writer panic.
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply a record captured now
    pub fn ingest(&self, record: TelemetryRecord) {
        self.ingest_at(record, now_nanos());
    }

    /// Apply a record with an explicit capture time in nanoseconds
    pub fn ingest_at(&self, record: TelemetryRecord, time: u64) {
        let TelemetryRecord { raw, sample } = record;
        let mut state = self.lock();

        state.readings.samples_received += 1;

        if let Some(rate) = sample.rate {
            if rate > 0.0 {
                state.readings.rate = Some(rate);
                state.rate_history.push(RatePoint { time, rate });
            } else {
                state.readings.rate = None;
            }
        }

        if let Some(count) = sample.breath_count {
            state.readings.breath_count = Some(count);
        }

        if let Some(label) = sample.status_label {
            state.readings.status = sample.status;
            state.readings.status_label = Some(label);
        }

        if let Some(filtered) = sample.filtered {
            state.filtered.push(filtered);
        }

        if let Some(threshold) = sample.threshold {
            state.threshold.fill(threshold);
        }

        state.session.push(raw);
    }

    pub fn readings(&self) -> LiveReadings {
        self.lock().readings.clone()
    }

    pub fn fast_window(&self) -> FastWindowSnapshot {
        let state = self.lock();
        FastWindowSnapshot {
            filtered: state.filtered.to_vec(),
            threshold: state.threshold.to_vec(),
        }
    }

    pub fn rate_history(&self) -> Vec<RatePoint> {
        self.lock().rate_history.to_vec()
    }

    /// Copy of every raw record in arrival order
    pub fn session_records(&self) -> Vec<Value> {
        self.lock().session.clone()
    }

    pub fn session_len(&self) -> usize {
        self.lock().session.len()
    }

    pub fn thresholds(&self) -> ThresholdConfig {
        self.thresholds
    }

    /// Drop all buffered data; called when a new connection starts
    pub fn reset(&self) {
        let mut state = self.lock();
        state.readings = LiveReadings::default();
        state.filtered.clear();
        state.threshold.clear();
        state.rate_history.clear();
        state.session.clear();
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new(
            FAST_WINDOW_CAPACITY,
            RATE_WINDOW_CAPACITY,
            ThresholdConfig::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_line;
    use std::sync::Arc;
    use std::thread;

    fn record(line: &str) -> TelemetryRecord {
        parse_line(line).expect("test line should parse")
    }

    #[test]
    fn test_rate_zero_never_enters_history() {
        let store = TelemetryStore::default();
        store.ingest_at(record(r#"{"rate": 16}"#), 1_000);
        assert_eq!(store.rate_history().len(), 1);

        store.ingest_at(record(r#"{"rate": 0}"#), 2_000);
        assert_eq!(store.rate_history().len(), 1);
        assert_eq!(store.readings().rate, None);

        store.ingest_at(record(r#"{"rate": 19.5}"#), 3_000);
        let history = store.rate_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], RatePoint { time: 3_000, rate: 19.5 });
    }

    #[test]
    fn test_rate_history_evicts_oldest() {
        let store = TelemetryStore::new(10, 3, ThresholdConfig::default());
        for i in 1..=5u64 {
            store.ingest_at(record(&format!(r#"{{"rate": {}}}"#, 10 + i)), i);
        }
        let rates: Vec<f64> = store.rate_history().iter().map(|p| p.rate).collect();
        assert_eq!(rates, vec![13.0, 14.0, 15.0]);
    }

    #[test]
    fn test_threshold_is_broadcast_across_window() {
        let store = TelemetryStore::new(5, 5, ThresholdConfig::default());
        store.ingest(record(r#"{"filtered": 0.1, "threshold": 0.3}"#));
        store.ingest(record(r#"{"filtered": 0.2}"#));

        let fast = store.fast_window();
        assert_eq!(fast.filtered, vec![0.1, 0.2]);
        assert_eq!(fast.threshold, vec![0.3; 5]);

        store.ingest(record(r#"{"threshold": 0.45}"#));
        assert_eq!(store.fast_window().threshold, vec![0.45; 5]);
    }

    #[test]
    fn test_readings_merge_partial_records() {
        let store = TelemetryStore::default();
        store.ingest(record(r#"{"rate": 18, "status": "NORMAL", "breathCount": 42}"#));
        store.ingest(record(r#"{"filtered": 0.7}"#));

        let readings = store.readings();
        assert_eq!(readings.rate, Some(18.0));
        assert_eq!(readings.breath_count, Some(42));
        assert_eq!(readings.status, BreathStatus::Normal);
        assert_eq!(readings.status_label.as_deref(), Some("NORMAL"));
        assert_eq!(readings.samples_received, 2);
    }

    #[test]
    fn test_session_log_is_unbounded_and_ordered() {
        let store = TelemetryStore::new(2, 2, ThresholdConfig::default());
        for i in 0..250 {
            store.ingest(record(&format!(r#"{{"breathCount": {}}}"#, i)));
        }
        let session = store.session_records();
        assert_eq!(session.len(), 250);
        assert_eq!(session[0]["breathCount"], 0);
        assert_eq!(session[249]["breathCount"], 249);
    }

    #[test]
    fn test_reset_clears_everything() {
        let store = TelemetryStore::default();
        store.ingest(record(r#"{"rate": 20, "filtered": 1.0, "threshold": 0.5}"#));
        store.reset();

        assert_eq!(store.readings(), LiveReadings::default());
        assert_eq!(store.fast_window(), FastWindowSnapshot::default());
        assert!(store.rate_history().is_empty());
        assert_eq!(store.session_len(), 0);
    }

    #[test]
    fn test_concurrent_readers_see_bounded_windows() {
        let store = Arc::new(TelemetryStore::new(100, 60, ThresholdConfig::default()));
        let writer_store = store.clone();

        let writer = thread::spawn(move || {
            for i in 0..2_000u64 {
                let line = format!(r#"{{"rate": {}, "filtered": {}}}"#, 10 + i % 10, i);
                writer_store.ingest(parse_line(&line).unwrap());
            }
        });

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        assert!(store.fast_window().filtered.len() <= 100);
                        assert!(store.rate_history().len() <= 60);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.session_len(), 2_000);
        assert_eq!(store.rate_history().len(), 60);
    }
}
