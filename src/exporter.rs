//! # Session Export Module
//!
//! Writes the raw session log to disk as a pretty-printed JSON array.
//!
//! ## File Layout
//! ```text
//! <export-dir>/resp_data_YYYYMMDD_HHMMSS.json
//! ```
//! The directory is created when missing. If a file with that name already
//! exists (two exports in the same second) a numeric suffix is added; an
//! export never overwrites an earlier one.

use crate::error::ExportError;
use chrono::{DateTime, Local};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "resp_data";
const FILE_EXTENSION: &str = "json";

/// Export `records` to a new file in `dir`, stamped with the current local time.
///
/// Returns the path written, or `ExportError::NothingToExport` for an empty
/// log (no file or directory is created in that case).
pub fn export_session(records: &[Value], dir: &Path) -> Result<PathBuf, ExportError> {
    export_session_at(records, dir, Local::now())
}

pub fn export_session_at(
    records: &[Value],
    dir: &Path,
    captured_at: DateTime<Local>,
) -> Result<PathBuf, ExportError> {
    if records.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let contents = serde_json::to_string_pretty(records).map_err(ExportError::Serialize)?;

    fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let stamp = captured_at.format("%Y%m%d_%H%M%S").to_string();
    let mut attempt = 0u32;
    loop {
        let path = dir.join(file_name(&stamp, attempt));
        match write_new(&path, contents.as_bytes()) {
            Ok(()) => {
                log::info!("Exported {} records to {}", records.len(), path.display());
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => return Err(ExportError::WriteFailed { path, source }),
        }
    }
}

fn file_name(stamp: &str, attempt: u32) -> String {
    if attempt == 0 {
        format!("{}_{}.{}", FILE_PREFIX, stamp, FILE_EXTENSION)
    } else {
        format!("{}_{}_{}.{}", FILE_PREFIX, stamp, attempt, FILE_EXTENSION)
    }
}

fn write_new(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
