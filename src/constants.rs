//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Configuration and data file locations
pub mod config {
    /// Directory name under the platform config/data dirs
    pub const APP_DIR: &str = "auto-continue";

    /// Settings file name (flat JSON object)
    pub const SETTINGS_FILE: &str = "settings.json";

    /// Append-only activity log file name
    pub const LOG_FILE: &str = "activity.log";
}

/// Template matching constants
pub mod matching {
    /// Minimum correlation score for a match to trigger a click.
    ///
    /// Fixed by design: high enough to reject generic UI chrome, low enough
    /// to tolerate anti-aliasing and compression noise in the button glyph.
    pub const CONFIDENCE_THRESHOLD: f64 = 0.8;

    /// Button template asset, resolved next to the executable at runtime
    pub const TEMPLATE_FILE: &str = "button_image.png";
}

/// Monitor loop and supervisor timing constants
pub mod monitoring {
    /// Consecutive failed scan cycles before the loop gives up
    pub const MAX_CONSECUTIVE_ERRORS: u32 = 5;

    /// Scan interval bounds enforced at the configuration boundary (seconds)
    pub const MIN_INTERVAL_SECS: u64 = 1;
    pub const MAX_INTERVAL_SECS: u64 = 60;

    /// Default scan interval (seconds)
    pub const DEFAULT_INTERVAL_SECS: u64 = 5;

    /// Granularity of the stop-flag poll during the inter-tick sleep (ms)
    pub const STOP_POLL_MS: u64 = 100;

    /// Watchdog cadence for the liveness check (seconds)
    pub const WATCHDOG_PERIOD_SECS: u64 = 60;

    /// Sentinel index meaning "scan every monitor"
    pub const ALL_MONITORS: i32 = -1;
}

/// User-facing notification constants
pub mod notify {
    /// Title carried by every notification triple
    pub const TITLE: &str = "Auto Continue";
}

/// Input event constants (from evdev)
pub mod input {
    /// Key press event value
    pub const KEY_PRESS: i32 = 1;
}

/// Filesystem paths for the hotkey listener
pub mod paths {
    /// Input device directory scanned for keyboards
    pub const DEV_INPUT: &str = "/dev/input";
}

pub mod permissions {
    /// Group membership required to read /dev/input devices
    pub const INPUT_GROUP: &str = "input";

    /// Command suggested to the user when device access fails
    pub const ADD_TO_INPUT_GROUP: &str = "sudo usermod -aG input $USER";
}
