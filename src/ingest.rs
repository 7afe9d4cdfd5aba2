//! # Ingestion Loop
//!
//! The only code that blocks on serial I/O. Runs on a dedicated thread:
//! read available bytes, frame them into lines, parse each line, and push
//! records into the shared `TelemetryStore`.
//!
//! ## Timing
//! - After each poll the loop sleeps `poll_interval` so an idle port does
//!   not spin the CPU.
//! - After a read error it logs, reports the error, and sleeps the longer
//!   `error_backoff` before retrying. Transient failures (USB
//!   re-enumeration, overruns) are expected; the loop never exits on them.
//! - The stop flag is checked once per iteration, so shutdown is observed
//!   within one poll cycle. A line mid-flight at stop time is dropped.

use crate::framing::LineDecoder;
use crate::record::parse_line;
use crate::telemetry::TelemetryStore;
use crate::transport::ByteSource;
use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Cooperative cancellation flag shared between coordinator and loop
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Events the loop reports to whoever is watching the connection
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    /// A read failed; the loop backs off and retries
    ReadError(String),
    /// First successful read after one or more failures
    Recovered,
    /// The loop observed the stop flag and exited
    Stopped,
}

/// Forwards loop events without ever blocking the loop.
#[derive(Clone)]
pub struct Handler {
    sender: Sender<IngestEvent>,
}

impl Handler {
    pub fn new(sender: Sender<IngestEvent>) -> Self {
        Self { sender }
    }

    fn notify(&self, event: IngestEvent) {
        match self.sender.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) => {
                log::debug!("Event queue full, dropping {:?}", event);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub read_chunk_size: usize,
    pub max_line_bytes: usize,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            error_backoff: Duration::from_millis(100),
            read_chunk_size: 1024,
            max_line_bytes: 16 * 1024,
        }
    }
}

/// Run until `stop` is raised. Consumes the source; it is dropped (and the
/// port closed) when the loop returns.
pub fn run_ingestion_loop<S: ByteSource>(
    mut source: S,
    store: Arc<TelemetryStore>,
    handler: Handler,
    stop: StopFlag,
    settings: LoopSettings,
) {
    let mut decoder = LineDecoder::new(settings.max_line_bytes);
    let mut buf = vec![0u8; settings.read_chunk_size.max(1)];
    let mut failing = false;

    log::info!("Ingestion loop started");

    while !stop.is_raised() {
        let read = source.read_available(&mut buf);
        // Bytes that arrive after stop belong to no session
        if stop.is_raised() {
            break;
        }
        match read {
            Ok(n) => {
                if failing {
                    log::info!("Serial read recovered");
                    handler.notify(IngestEvent::Recovered);
                    failing = false;
                }
                if n > 0 {
                    for line in decoder.feed(&buf[..n]) {
                        if let Some(record) = parse_line(&line) {
                            store.ingest(record);
                        }
                    }
                }
                thread::sleep(settings.poll_interval);
            }
            Err(e) => {
                log::warn!("Error reading serial data: {}", e);
                handler.notify(IngestEvent::ReadError(e.to_string()));
                failing = true;
                thread::sleep(settings.error_backoff);
            }
        }
    }

    log::info!("Ingestion loop stopped");
    handler.notify(IngestEvent::Stopped);
}
