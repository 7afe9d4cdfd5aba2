//! # Terminal Readouts
//!
//! Formats telemetry snapshots as single text lines for the headless
//! monitor. The fast line mirrors the live signal view; the history line
//! summarizes the rate chart.

use crate::classifier::{BreathStatus, ThresholdConfig};
use crate::telemetry::{FastWindowSnapshot, LiveReadings};
use crate::window::{RatePoint, RateSliceExt};

const NO_VALUE: &str = "--";

fn status_marker(status: BreathStatus) -> &'static str {
    if status.is_alert() {
        "ALERT"
    } else if status == BreathStatus::Normal {
        "OK"
    } else {
        ".."
    }
}

pub fn healthy_range(thresholds: &ThresholdConfig) -> String {
    format!(
        "Healthy range: {}-{} breaths/min",
        thresholds.low, thresholds.high
    )
}

/// Live readout: rate, status, breath count, latest signal values
pub fn live_line(readings: &LiveReadings, fast: &FastWindowSnapshot) -> String {
    let rate = readings
        .rate
        .map(|r| format!("{:.1}", r))
        .unwrap_or_else(|| NO_VALUE.to_string());
    let count = readings
        .breath_count
        .map(|c| c.to_string())
        .unwrap_or_else(|| "0".to_string());
    let filtered = fast
        .filtered
        .last()
        .map(|v| format!("{:.3}", v))
        .unwrap_or_else(|| NO_VALUE.to_string());
    let threshold = fast
        .threshold
        .last()
        .map(|v| format!("{:.3}", v))
        .unwrap_or_else(|| NO_VALUE.to_string());

    format!(
        "rate {} /min | status {} [{}] | breaths {} | signal {} (threshold {})",
        rate,
        readings.status_label.as_deref().unwrap_or("unknown"),
        status_marker(readings.status),
        count,
        filtered,
        threshold
    )
}

/// Summary of the rate-history window
pub fn history_line(history: &[RatePoint]) -> String {
    let (Some((min_rate, max_rate)), Some((first, last))) =
        (history.min_max_rate(), history.min_max_time())
    else {
        return "rate history: waiting for first reading".to_string();
    };

    let span_secs = (last - first) as f64 / 1e9;
    format!(
        "rate history: {} readings over {:.0}s, min {:.1}, max {:.1}",
        history.len(),
        span_secs,
        min_rate,
        max_rate
    )
}
