//! Live breathing-rate telemetry from a serial respiration sensor.
//!
//! The sensor firmware prints one JSON object per line. This crate reads the
//! serial stream on a background thread, keeps rolling windows for display,
//! and exports the raw session on demand. Rendering is left to the caller,
//! which polls [`ConnectionManager`] snapshots on its own schedule.

pub mod classifier;
pub mod config;
pub mod connection;
pub mod error;
pub mod exporter;
pub mod framing;
pub mod ingest;
pub mod monitor;
pub mod record;
pub mod telemetry;
pub mod transport;
pub mod window;

pub use classifier::{BreathStatus, ThresholdConfig};
pub use config::Config;
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{ConfigError, ConnectionError, ExportError, ScanError};
pub use record::{parse_line, TelemetryRecord, TelemetrySample};
pub use telemetry::{FastWindowSnapshot, LiveReadings, TelemetryStore};
pub use window::{RatePoint, RollingWindow};
