//! # Breathing Status Classification
//!
//! The sensor firmware classifies its own rate and reports a status label.
//! That label is decoded once, here, into a closed enum; consumers match on
//! the enum instead of comparing strings. `ThresholdConfig` carries the
//! healthy band so consumers can cross-check the device's verdict.

use serde::{Deserialize, Serialize};

/// Device-reported breathing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BreathStatus {
    /// Rate within the healthy band
    Normal,
    /// Rate above the high threshold
    High,
    /// Rate below the low threshold
    Low,
    /// Label absent or not recognized; rendered neutrally
    #[default]
    Unknown,
}

impl BreathStatus {
    /// Decode a device label.
    ///
    /// Matching is case-insensitive and accepts both the English labels and
    /// the Spanish ones older firmware emits (`ALTO`, `BAJO`).
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "normal" => BreathStatus::Normal,
            "high" | "alto" => BreathStatus::High,
            "low" | "bajo" => BreathStatus::Low,
            _ => BreathStatus::Unknown,
        }
    }

    /// Whether this status should be rendered as an alert
    pub fn is_alert(&self) -> bool {
        matches!(self, BreathStatus::High | BreathStatus::Low)
    }
}

/// Healthy breathing-rate band in breaths per minute
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub low: f64,
    pub high: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            low: 12.0,
            high: 25.0,
        }
    }
}

impl ThresholdConfig {
    /// Classify a rate against the band.
    ///
    /// The live pipeline never calls this; status comes from the device.
    /// Returns `Unknown` for a rate of 0, the "not yet determined" sentinel.
    pub fn classify(&self, rate: f64) -> BreathStatus {
        if rate <= 0.0 {
            BreathStatus::Unknown
        } else if rate > self.high {
            BreathStatus::High
        } else if rate < self.low {
            BreathStatus::Low
        } else {
            BreathStatus::Normal
        }
    }
}
