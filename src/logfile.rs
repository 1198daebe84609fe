//! Append-only activity log
//!
//! One line per user-visible event, `<timestamp> - <LEVEL> - <message>`.
//! The file is never rotated or truncated here; the log-viewer shell reads
//! it back verbatim. Write failures are reported via tracing and never
//! propagate into the scan path.

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::error;

use crate::constants::config;
use crate::types::Severity;

pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Activity log in the platform data directory
    pub fn open_default() -> Self {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(config::APP_DIR);
        path.push(config::LOG_FILE);
        Self::new(path)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Append one event line, creating the file and its directory on first use
    pub fn append(&self, severity: Severity, message: &str) {
        if let Err(e) = self.try_append(severity, message) {
            error!(path = %self.path.display(), error = %e, "Failed to append to activity log");
        }
    }

    fn try_append(&self, severity: Severity, message: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        writeln!(file, "{} - {} - {}", timestamp, severity.as_str(), message)
    }
}
