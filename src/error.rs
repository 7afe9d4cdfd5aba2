//! # Error Types Module
//!
//! Centralized error handling for the respiration monitor.
//! Each concern gets its own error type with context and error chaining.
//!
//! ## Error Types
//! - `ConnectionError`: Serial port open failures and coordinator misuse
//! - `ScanError`: Serial endpoint enumeration errors
//! - `ExportError`: Session export outcomes other than success
//! - `ConfigError`: Configuration file I/O and parsing errors
//!
//! Malformed wire lines are deliberately absent here: the record parser
//! returns `Option` and discards them without surfacing anything.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur while opening or coordinating a serial connection
#[derive(Debug)]
pub enum ConnectionError {
    /// The serial port could not be opened
    PortUnavailable { port: String, reason: String },
    /// A connection (and its ingestion loop) is already active
    AlreadyActive,
    /// Operation requires an active connection
    NotConnected,
    /// The background reader thread could not be started
    WorkerSpawn(std::io::Error),
    /// The reader was told to stop but has not exited yet
    ShutdownPending { endpoint: String },
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::PortUnavailable { port, reason } => {
                write!(f, "Could not open serial port {}: {}", port, reason)
            }
            ConnectionError::AlreadyActive => {
                write!(f, "A connection is already active; disconnect first")
            }
            ConnectionError::NotConnected => {
                write!(f, "No active connection")
            }
            ConnectionError::WorkerSpawn(e) => {
                write!(f, "Failed to start serial reader thread: {}", e)
            }
            ConnectionError::ShutdownPending { endpoint } => {
                write!(f, "Serial reader for {} is still stopping", endpoint)
            }
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::WorkerSpawn(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors that can occur while enumerating serial endpoints
#[derive(Debug, Clone)]
pub enum ScanError {
    /// The operating system refused to list serial ports
    EnumerationFailed(String),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::EnumerationFailed(msg) => {
                write!(f, "Failed to list serial ports: {}", msg)
            }
        }
    }
}

impl std::error::Error for ScanError {}

/// Outcomes of a session export that did not produce a file
#[derive(Debug)]
pub enum ExportError {
    /// The session log is empty; no file was written
    NothingToExport,
    /// The destination directory could not be created
    CreateDir { path: PathBuf, source: std::io::Error },
    /// The export file could not be written
    WriteFailed { path: PathBuf, source: std::io::Error },
    /// The session records could not be serialized
    Serialize(serde_json::Error),
}

impl ExportError {
    /// True for the "nothing to export" outcome, as opposed to a failed write
    pub fn is_nothing_to_export(&self) -> bool {
        matches!(self, ExportError::NothingToExport)
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::NothingToExport => {
                write!(f, "No data to export")
            }
            ExportError::CreateDir { path, source } => {
                write!(f, "Failed to create export directory {}: {}", path.display(), source)
            }
            ExportError::WriteFailed { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
            ExportError::Serialize(e) => {
                write!(f, "Failed to serialize session data: {}", e)
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::NothingToExport => None,
            ExportError::CreateDir { source, .. } => Some(source),
            ExportError::WriteFailed { source, .. } => Some(source),
            ExportError::Serialize(e) => Some(e),
        }
    }
}

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_port_unavailable_display() {
        let err = ConnectionError::PortUnavailable {
            port: "/dev/ttyUSB0".to_string(),
            reason: "Permission denied".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/dev/ttyUSB0"));
        assert!(msg.contains("Permission denied"));
    }

    #[test]
    fn test_export_outcomes_are_distinct() {
        assert!(ExportError::NothingToExport.is_nothing_to_export());

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ExportError::WriteFailed {
            path: PathBuf::from("out/resp_data.json"),
            source: io_err,
        };
        assert!(!err.is_nothing_to_export());
        assert!(err.source().is_some());
    }

    #[test]
    fn test_config_error_chain() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::ReadFailed(io_err);
        assert!(err.source().is_some());
    }
}
