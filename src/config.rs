//! Settings persistence
//!
//! Flat JSON settings file read at startup and fully overwritten on every
//! user-triggered change. A missing file silently yields defaults; a
//! malformed file yields defaults with an error log, never a crash.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::constants::{config, matching, monitoring};
use crate::types::MonitorSelection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Seconds between scan cycles, clamped to [1, 60]
    #[serde(default = "default_interval")]
    pub interval: u64,

    #[serde(default = "default_notifications_enabled")]
    pub notifications_enabled: bool,

    /// Raw monitor index list; -1 means "all monitors"
    #[serde(default)]
    pub selected_monitors: MonitorSelection,
}

fn default_interval() -> u64 {
    monitoring::DEFAULT_INTERVAL_SECS
}

fn default_notifications_enabled() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            notifications_enabled: default_notifications_enabled(),
            selected_monitors: MonitorSelection::default(),
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(config::APP_DIR);
        path.push(config::SETTINGS_FILE);
        path
    }

    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or unreadable as JSON.
    pub fn load_from(path: &std::path::Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Settings>(&contents) {
                Ok(mut settings) => {
                    settings.validate_and_clamp();
                    settings
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to parse settings file, using defaults");
                    Settings::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "No settings file found, using defaults");
                Settings::default()
            }
        }
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Write the full settings object to `path`, overwriting any previous
    /// contents.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)
            .context("Failed to serialize settings to JSON")?;
        fs::write(path, contents)
            .context(format!("Failed to write settings file to {}", path.display()))?;
        Ok(())
    }

    /// Clamp values to safe ranges after loading or user edits
    pub fn validate_and_clamp(&mut self) {
        if self.interval < monitoring::MIN_INTERVAL_SECS {
            warn!(interval = self.interval, min = monitoring::MIN_INTERVAL_SECS, "interval below minimum, clamping");
            self.interval = monitoring::MIN_INTERVAL_SECS;
        } else if self.interval > monitoring::MAX_INTERVAL_SECS {
            warn!(interval = self.interval, max = monitoring::MAX_INTERVAL_SECS, "interval exceeds maximum, clamping");
            self.interval = monitoring::MAX_INTERVAL_SECS;
        }
    }
}

/// Path of the button template asset: an install-time constant resolved
/// next to the executable, not a user-tunable setting.
pub fn template_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(matching::TEMPLATE_FILE)))
        .unwrap_or_else(|| PathBuf::from(matching::TEMPLATE_FILE))
}
