//! # Telemetry Record Parsing
//!
//! Decodes one framed line into a typed sample. The serial wire is shared
//! with boot banners and debug prints, so anything that is not a JSON object
//! is discarded quietly. A discarded line is routine, not an error.
//!
//! ## Wire keys
//! - `rate` (alias `rpm`): breaths per minute, 0 = not yet determined
//! - `breathCount`: cumulative breaths since device start
//! - `status`: device classification label
//! - `filtered`: filtered signal amplitude
//! - `threshold`: current detection threshold
//!
//! Unknown keys are ignored. A known key with the wrong type is treated as
//! absent instead of rejecting the whole record.

use crate::classifier::BreathStatus;
use serde_json::{Map, Value};

const UNKNOWN_LABEL: &str = "unknown";

/// One decoded telemetry record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySample {
    pub rate: Option<f64>,
    pub breath_count: Option<u64>,
    pub status_label: Option<String>,
    pub status: BreathStatus,
    pub filtered: Option<f64>,
    pub threshold: Option<f64>,
}

impl TelemetrySample {
    /// Status label as reported, or `"unknown"` when the record had none
    pub fn label(&self) -> &str {
        self.status_label.as_deref().unwrap_or(UNKNOWN_LABEL)
    }

    /// True when the record carried none of the recognized fields
    pub fn is_empty(&self) -> bool {
        self.rate.is_none()
            && self.breath_count.is_none()
            && self.status_label.is_none()
            && self.filtered.is_none()
            && self.threshold.is_none()
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        let rate = object
            .get("rate")
            .or_else(|| object.get("rpm"))
            .and_then(Value::as_f64)
            .filter(|rate| rate.is_finite() && *rate >= 0.0);

        // `42.0` is accepted as 42; `3.9` is not an integer count
        let breath_count = object.get("breathCount").and_then(|v| {
            v.as_u64().or_else(|| {
                v.as_f64()
                    .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64)
                    .map(|n| n as u64)
            })
        });

        let status_label = object
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string);
        let status = status_label
            .as_deref()
            .map(BreathStatus::from_label)
            .unwrap_or_default();

        Self {
            rate,
            breath_count,
            status_label,
            status,
            filtered: object.get("filtered").and_then(Value::as_f64),
            threshold: object.get("threshold").and_then(Value::as_f64),
        }
    }
}

/// A parsed line: the raw object kept for export plus its typed view
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub raw: Value,
    pub sample: TelemetrySample,
}

/// Parse one candidate line.
///
/// Returns `None` for lines that are not brace-delimited, fail to decode, or
/// decode to something other than an object. Never panics on input.
pub fn parse_line(line: &str) -> Option<TelemetryRecord> {
    let line = line.trim();
    if !(line.starts_with('{') && line.ends_with('}')) {
        return None;
    }

    let raw: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("Discarding malformed record ({}): {}", e, line);
            return None;
        }
    };

    let sample = TelemetrySample::from_object(raw.as_object()?);
    Some(TelemetryRecord { raw, sample })
}
