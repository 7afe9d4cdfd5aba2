//! # Connection Management Module
//!
//! Coordinates the serial connection lifecycle: opening the port, starting
//! and stopping the background reader, and giving the presentation layer
//! read-only access to live telemetry.
//!
//! ## Key Components
//! - `ConnectionManager`: Owns the connection state and the reader thread
//! - `ConnectionState`: Disconnected → Connecting → Connected → Disconnecting
//!
//! At most one reader runs at a time. `connect` while a connection is active
//! is rejected here; the loop itself does not guard against it.
//!
//! Shutdown raises the stop flag and waits up to `shutdown_timeout` for the
//! reader to exit. The reader owns the port and closes it on exit. A reader
//! that misses the deadline is never killed: it stays parked and the manager
//! stays `Disconnecting`, rejecting new connections until the reader exits.

use crate::classifier::ThresholdConfig;
use crate::config::Config;
use crate::error::{ConnectionError, ExportError, ScanError};
use crate::exporter::export_session;
use crate::ingest::{run_ingestion_loop, Handler, IngestEvent, LoopSettings, StopFlag};
use crate::telemetry::{FastWindowSnapshot, LiveReadings, TelemetryStore};
use crate::transport::{list_endpoints, ByteSource, SerialConnection, SerialEndpoint};
use crate::window::RatePoint;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const EVENT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub baud_rate: u32,
    pub timeout: Duration,
    pub shutdown_timeout: Duration,
    pub loop_settings: LoopSettings,
}

impl ConnectionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            baud_rate: config.serial.baud_rate,
            timeout: Duration::from_millis(config.serial.timeout_ms),
            shutdown_timeout: Duration::from_millis(config.ingest.shutdown_timeout_ms),
            loop_settings: LoopSettings {
                poll_interval: Duration::from_millis(config.ingest.poll_interval_ms),
                error_backoff: Duration::from_millis(config.ingest.error_backoff_ms),
                read_chunk_size: config.ingest.read_chunk_size,
                max_line_bytes: config.ingest.max_line_bytes,
            },
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

struct Worker {
    endpoint: String,
    stop: StopFlag,
    done: Receiver<()>,
    handle: thread::JoinHandle<()>,
}

/// Manages the connection lifecycle for a respiration sensor.
pub struct ConnectionManager {
    settings: ConnectionSettings,
    store: Arc<TelemetryStore>,
    state: ConnectionState,
    worker: Option<Worker>,
    event_sender: Sender<IngestEvent>,
    event_receiver: Receiver<IngestEvent>,
}

impl ConnectionManager {
    pub fn new(settings: ConnectionSettings, store: Arc<TelemetryStore>) -> Self {
        let (event_sender, event_receiver) = bounded(EVENT_QUEUE_CAPACITY);
        Self {
            settings,
            store,
            state: ConnectionState::Disconnected,
            worker: None,
            event_sender,
            event_receiver,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let store = TelemetryStore::new(
            config.display.fast_window,
            config.display.rate_window,
            config.thresholds,
        );
        Self::new(ConnectionSettings::from_config(config), Arc::new(store))
    }

    /// Serial ports available to `connect`
    pub fn list_endpoints(&self) -> Result<Vec<SerialEndpoint>, ScanError> {
        list_endpoints()
    }

    /// Open `endpoint` and start reading from it.
    ///
    /// Port errors are returned here and leave the manager disconnected.
    pub fn connect(&mut self, endpoint: &str) -> Result<(), ConnectionError> {
        self.ensure_idle()?;

        log::info!("Connecting to {}", endpoint);
        self.state = ConnectionState::Connecting;

        match SerialConnection::open(endpoint, self.settings.baud_rate, self.settings.timeout) {
            Ok(port) => self.start_worker(port, endpoint),
            Err(e) => {
                log::error!("{}", e);
                self.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Start reading from an already-open byte source
    pub fn connect_source<S>(&mut self, source: S, label: &str) -> Result<(), ConnectionError>
    where
        S: ByteSource + 'static,
    {
        self.ensure_idle()?;
        self.state = ConnectionState::Connecting;
        self.start_worker(source, label)
    }

    fn ensure_idle(&mut self) -> Result<(), ConnectionError> {
        if self.state == ConnectionState::Disconnecting {
            self.reap_stopped_worker();
        }
        if self.worker.is_some() || self.state != ConnectionState::Disconnected {
            return Err(ConnectionError::AlreadyActive);
        }
        Ok(())
    }

    fn start_worker<S>(&mut self, source: S, endpoint: &str) -> Result<(), ConnectionError>
    where
        S: ByteSource + 'static,
    {
        // One session per connection
        self.store.reset();
        while self.event_receiver.try_recv().is_ok() {}

        let stop = StopFlag::new();
        let (done_sender, done) = bounded(1);

        let spawned = {
            let store = self.store.clone();
            let handler = Handler::new(self.event_sender.clone());
            let stop = stop.clone();
            let loop_settings = self.settings.loop_settings;
            thread::Builder::new()
                .name("serial-reader".to_string())
                .spawn(move || {
                    run_ingestion_loop(source, store, handler, stop, loop_settings);
                    let _ = done_sender.send(());
                })
        };

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker {
                    endpoint: endpoint.to_string(),
                    stop,
                    done,
                    handle,
                });
                self.state = ConnectionState::Connected;
                log::info!("Connected to {}", endpoint);
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                Err(ConnectionError::WorkerSpawn(e))
            }
        }
    }

    /// Stop the reader and release the port.
    ///
    /// If the reader does not exit within `shutdown_timeout` it is kept
    /// parked, the state stays `Disconnecting`, and `ShutdownPending` is
    /// returned. Calling `disconnect` again waits another round.
    pub fn disconnect(&mut self) -> Result<(), ConnectionError> {
        let worker = self.worker.take().ok_or(ConnectionError::NotConnected)?;

        log::info!("Disconnecting from {}", worker.endpoint);
        self.state = ConnectionState::Disconnecting;
        worker.stop.raise();

        match worker.done.recv_timeout(self.settings.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                Self::join_worker(worker);
                self.state = ConnectionState::Disconnected;
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Serial reader for {} did not stop within {:?}",
                    worker.endpoint,
                    self.settings.shutdown_timeout
                );
                let endpoint = worker.endpoint.clone();
                self.worker = Some(worker);
                Err(ConnectionError::ShutdownPending { endpoint })
            }
        }
    }

    /// Release a parked reader if it has exited since `disconnect` timed out
    fn reap_stopped_worker(&mut self) {
        let exited = match &self.worker {
            Some(worker) => {
                worker.stop.is_raised()
                    && !matches!(worker.done.try_recv(), Err(TryRecvError::Empty))
            }
            None => true,
        };
        if !exited {
            return;
        }
        if let Some(worker) = self.worker.take() {
            Self::join_worker(worker);
        }
        self.state = ConnectionState::Disconnected;
    }

    fn join_worker(worker: Worker) {
        if worker.handle.join().is_err() {
            log::error!("Serial reader for {} panicked", worker.endpoint);
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Endpoint of the active connection
    pub fn endpoint(&self) -> Option<&str> {
        self.worker.as_ref().map(|w| w.endpoint.as_str())
    }

    /// Loop events (read errors, recovery, stop) for display
    pub fn events(&self) -> Receiver<IngestEvent> {
        self.event_receiver.clone()
    }

    pub fn store(&self) -> Arc<TelemetryStore> {
        self.store.clone()
    }

    pub fn readings(&self) -> LiveReadings {
        self.store.readings()
    }

    pub fn fast_window(&self) -> FastWindowSnapshot {
        self.store.fast_window()
    }

    pub fn rate_history(&self) -> Vec<RatePoint> {
        self.store.rate_history()
    }

    pub fn thresholds(&self) -> ThresholdConfig {
        self.store.thresholds()
    }

    /// Write the current session log to a timestamped file in `dir`
    pub fn export(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        export_session(&self.store.session_records(), dir)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Instant;

    /// Feeds whatever the test pushes through a channel
    struct ChannelSource {
        bytes: Receiver<Vec<u8>>,
    }

    impl ByteSource for ChannelSource {
        fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.bytes.try_recv() {
                Ok(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                Err(_) => Ok(0),
            }
        }
    }

    fn test_settings() -> ConnectionSettings {
        ConnectionSettings {
            shutdown_timeout: Duration::from_secs(2),
            loop_settings: LoopSettings {
                poll_interval: Duration::from_millis(1),
                error_backoff: Duration::from_millis(5),
                ..LoopSettings::default()
            },
            ..ConnectionSettings::default()
        }
    }

    fn manager() -> ConnectionManager {
        ConnectionManager::new(test_settings(), Arc::new(TelemetryStore::default()))
    }

    fn channel_source() -> (Sender<Vec<u8>>, ChannelSource) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (tx, ChannelSource { bytes: rx })
    }

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_connect_and_disconnect_lifecycle() {
        let mut manager = manager();
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        let (tx, source) = channel_source();
        manager.connect_source(source, "test").unwrap();
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.endpoint(), Some("test"));

        tx.send(b"{\"rate\": 14, \"breathCount\": 3}\n".to_vec()).unwrap();
        assert!(wait_for(|| manager.readings().rate == Some(14.0)));

        manager.disconnect().unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.endpoint(), None);
        assert!(manager.events().try_iter().any(|e| e == IngestEvent::Stopped));
    }

    #[test]
    fn test_second_connect_is_rejected() {
        let mut manager = manager();
        let (_tx, source) = channel_source();
        manager.connect_source(source, "first").unwrap();

        let (_tx2, second) = channel_source();
        let result = manager.connect_source(second, "second");
        assert!(matches!(result, Err(ConnectionError::AlreadyActive)));
        assert_eq!(manager.endpoint(), Some("first"));
    }

    #[test]
    fn test_disconnect_without_connection() {
        let mut manager = manager();
        assert!(matches!(manager.disconnect(), Err(ConnectionError::NotConnected)));
    }

    #[test]
    fn test_open_failure_leaves_manager_disconnected() {
        let mut manager = manager();
        let result = manager.connect("/dev/respira-monitor-does-not-exist");
        assert!(matches!(result, Err(ConnectionError::PortUnavailable { .. })));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_new_connection_starts_new_session() {
        let mut manager = manager();
        let (tx, source) = channel_source();
        manager.connect_source(source, "first").unwrap();
        tx.send(b"{\"rate\": 20}\n{\"rate\": 21}\n".to_vec()).unwrap();
        assert!(wait_for(|| manager.store().session_len() == 2));
        manager.disconnect().unwrap();

        // Data stays readable (and exportable) after disconnect
        assert_eq!(manager.store().session_len(), 2);

        let (_tx, source) = channel_source();
        manager.connect_source(source, "second").unwrap();
        assert_eq!(manager.store().session_len(), 0);
        assert!(manager.rate_history().is_empty());
    }

    /// Blocks inside its first read, like a wedged USB adapter
    struct SlowSource {
        delay: Duration,
        sent: bool,
    }

    impl ByteSource for SlowSource {
        fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Ok(0);
            }
            thread::sleep(self.delay);
            self.sent = true;
            let line = b"{\"rate\": 99}\n";
            buf[..line.len()].copy_from_slice(line);
            Ok(line.len())
        }
    }

    #[test]
    fn test_slow_reader_blocks_reconnect_until_it_exits() {
        let settings = ConnectionSettings {
            shutdown_timeout: Duration::from_millis(20),
            ..test_settings()
        };
        let mut manager = ConnectionManager::new(settings, Arc::new(TelemetryStore::default()));
        let slow = SlowSource {
            delay: Duration::from_millis(300),
            sent: false,
        };
        manager.connect_source(slow, "old").unwrap();
        thread::sleep(Duration::from_millis(20));

        let result = manager.disconnect();
        assert!(matches!(result, Err(ConnectionError::ShutdownPending { .. })));
        assert_eq!(manager.state(), ConnectionState::Disconnecting);

        let (_tx, source) = channel_source();
        let result = manager.connect_source(source, "new");
        assert!(matches!(result, Err(ConnectionError::AlreadyActive)));
        assert_eq!(manager.endpoint(), Some("old"));

        // Once the old reader finishes its read it exits without ingesting
        let start = Instant::now();
        loop {
            let (_tx, source) = channel_source();
            match manager.connect_source(source, "new") {
                Ok(()) => break,
                Err(ConnectionError::AlreadyActive) if start.elapsed() < Duration::from_secs(2) => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(e) => panic!("reconnect failed: {}", e),
            }
        }
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.endpoint(), Some("new"));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(manager.store().session_len(), 0);
        assert_eq!(manager.readings().rate, None);
    }

    #[test]
    fn test_disconnect_retry_after_timeout() {
        let settings = ConnectionSettings {
            shutdown_timeout: Duration::from_millis(20),
            ..test_settings()
        };
        let mut manager = ConnectionManager::new(settings, Arc::new(TelemetryStore::default()));
        let slow = SlowSource {
            delay: Duration::from_millis(100),
            sent: false,
        };
        manager.connect_source(slow, "slow").unwrap();
        thread::sleep(Duration::from_millis(10));

        assert!(manager.disconnect().is_err());
        thread::sleep(Duration::from_millis(200));
        manager.disconnect().unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_export_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager();
        let result = manager.export(dir.path());
        assert!(matches!(result, Err(ExportError::NothingToExport)));
    }
}
