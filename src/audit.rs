//! Genome Vault - Authentication Attempt Log
//!
//! Append-only CSV audit trail. Header row on first write, one row per
//! attempt: `timestamp,admin_name,similarity,success`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::VaultResult;

/// CSV header written when the log file is created
pub const LOG_HEADER: &str = "timestamp,admin_name,similarity,success";

/// Sentinel identity for attempts with no matched admin
pub const UNKNOWN_ADMIN: &str = "Unknown";

/// One authentication attempt
#[derive(Debug, Clone)]
pub struct AttemptEntry {
    /// Matched admin name, or the sentinel for failures
    pub admin_name: String,
    /// Best similarity score observed (0.0 when no face was scored)
    pub similarity: f32,
    /// Outcome of the attempt
    pub success: bool,
}

impl AttemptEntry {
    /// Successful match against a named admin
    pub fn matched(name: &str, similarity: f32) -> Self {
        Self {
            admin_name: name.to_string(),
            similarity,
            success: true,
        }
    }

    /// Failed attempt with no matched identity
    pub fn unknown(similarity: f32) -> Self {
        Self {
            admin_name: UNKNOWN_ADMIN.to_string(),
            similarity,
            success: false,
        }
    }
}

/// Append-only attempt log
pub struct AttemptLog {
    path: PathBuf,
}

impl AttemptLog {
    /// Create a log handle; the file is created on first append
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Log file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one attempt. Creates the file with its header when absent.
    pub fn append(&self, entry: &AttemptEntry) -> VaultResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let is_new = !self.path.exists();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if is_new {
            writeln!(file, "{}", LOG_HEADER)?;
        }

        writeln!(
            file,
            "{},{},{:.4},{}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            entry.admin_name,
            entry.similarity,
            if entry.success { "True" } else { "False" }
        )?;
        file.sync_all()?;

        Ok(())
    }

    /// Read back the raw log contents
    pub fn read(&self) -> VaultResult<String> {
        if !self.path.exists() {
            return Ok(String::new());
        }
        Ok(fs::read_to_string(&self.path)?)
    }
}
