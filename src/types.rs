//! Shared plain types passed between the worker loop, the supervisor and
//! the shell.

use crate::constants::monitoring;

/// Geometry of one physical display within the virtual-screen coordinate
/// space. Produced fresh on every scan; never cached across ticks because
/// monitors may be hot-plugged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorGeometry {
    /// 0-based enumeration index, stable only while no displays come or go
    pub index: usize,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Global-screen coordinate a click is dispatched at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickPoint {
    pub x: i32,
    pub y: i32,
}

/// Severity attached to notification triples and activity-log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// User-facing notification triple. Delivery is the shell's concern; the
/// core only emits these.
#[derive(Debug, Clone)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

/// Events sent from the monitor loop to the supervisor
#[derive(Debug, Clone)]
pub enum LoopEvent {
    /// Activity worth a log line (e.g. a dispatched click)
    Log(String),

    /// Notification requested by the loop (already gated on the
    /// notifications-enabled flag the loop was constructed with)
    Notification(Notice),

    /// A scan cycle failed; the loop keeps running
    Error(String),

    /// The consecutive-failure ceiling was reached; the loop has stopped
    /// itself. Emitted exactly once per loop lifetime.
    Fatal(String),
}

/// Commands from the global hotkey listener to the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorCommand {
    ToggleMonitoring,
    ToggleNotifications,
}

/// The set of monitor indices the user wants scanned.
///
/// Stored as the raw list from the settings file: `-1` is the "all
/// monitors" sentinel and takes precedence over any concrete indices,
/// duplicates are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MonitorSelection(Vec<i32>);

impl Default for MonitorSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl MonitorSelection {
    pub fn new(indices: Vec<i32>) -> Self {
        Self(indices)
    }

    /// Selection covering every enumerated monitor
    pub fn all() -> Self {
        Self(vec![monitoring::ALL_MONITORS])
    }

    pub fn is_all(&self) -> bool {
        self.0.contains(&monitoring::ALL_MONITORS)
    }

    /// Whether the monitor at `index` should be scanned
    pub fn includes(&self, index: usize) -> bool {
        self.is_all() || self.0.contains(&(index as i32))
    }
}
