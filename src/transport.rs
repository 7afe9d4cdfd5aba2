//! # Serial Transport
//!
//! Endpoint discovery and the byte source the ingestion loop reads from.
//!
//! `ByteSource` is the seam between the loop and real hardware: the loop
//! only needs "give me whatever bytes are available right now". Tests drive
//! the loop with scripted sources instead of a port.

use crate::error::{ConnectionError, ScanError};
use serialport::{SerialPort, SerialPortType};
use std::io::{self, Read};
use std::time::Duration;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// A serial endpoint available on this machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialEndpoint {
    /// OS path or name used to open the port (e.g. `/dev/ttyUSB0`, `COM3`)
    pub name: String,
    /// Human-readable description, when the OS provides one
    pub description: String,
}

impl SerialEndpoint {
    pub fn new(name: String, description: String) -> Self {
        Self { name, description }
    }
}

/// Source of raw bytes for the ingestion loop
pub trait ByteSource: Send {
    /// Read whatever bytes are currently available into `buf`.
    ///
    /// Returns `Ok(0)` when nothing is waiting. Must not block for longer
    /// than the port's configured timeout.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Lists serial endpoints. An empty list is not an error.
pub fn list_endpoints() -> Result<Vec<SerialEndpoint>, ScanError> {
    let ports = serialport::available_ports()
        .map_err(|e| ScanError::EnumerationFailed(e.to_string()))?;

    Ok(ports
        .into_iter()
        .map(|port| {
            let description = describe(&port.port_type);
            SerialEndpoint::new(port.port_name, description)
        })
        .collect())
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let name = [usb.manufacturer.as_deref(), usb.product.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            if name.is_empty() {
                format!("USB {:04x}:{:04x}", usb.vid, usb.pid)
            } else {
                name
            }
        }
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::Unknown => String::new(),
    }
}

/// An open serial port
pub struct SerialConnection {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialConnection {
    /// Open `endpoint` at `baud_rate`. Failure is reported synchronously.
    pub fn open(endpoint: &str, baud_rate: u32, timeout: Duration) -> Result<Self, ConnectionError> {
        let port = serialport::new(endpoint, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| ConnectionError::PortUnavailable {
                port: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        log::info!("Opened serial port {} at {} baud", endpoint, baud_rate);

        Ok(Self {
            name: endpoint.to_string(),
            port,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ByteSource for SerialConnection {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let waiting = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
        if waiting == 0 {
            return Ok(0);
        }

        let len = waiting.min(buf.len());
        match self.port.read(&mut buf[..len]) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }
}

impl Drop for SerialConnection {
    fn drop(&mut self) {
        log::info!("Closed serial port {}", self.name);
    }
}
