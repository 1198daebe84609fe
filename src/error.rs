//! Error taxonomy for the scan path.
//!
//! Everything that can fail inside one scan cycle maps onto one of these
//! variants so the monitor loop can log an actionable message before it
//! decides between retry and giving up. All variants count toward the
//! consecutive-failure ceiling.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The button template asset is missing or undecodable. A configuration
    /// problem, but surfaced per tick so a bad install fails through the
    /// normal error chain instead of crashing at startup.
    #[error("button template unavailable: {0}")]
    Template(String),

    /// The platform refused to enumerate or grab a screen region
    #[error("screen capture failed: {0}")]
    Capture(String),

    /// The template does not fit inside the captured snapshot
    #[error("template {template_w}x{template_h} larger than snapshot {snapshot_w}x{snapshot_h}")]
    TemplateTooLarge {
        template_w: u32,
        template_h: u32,
        snapshot_w: u32,
        snapshot_h: u32,
    },

    /// Synthetic input injection was rejected by the platform
    #[error("input dispatch failed: {0}")]
    Dispatch(String),

    /// A per-monitor failure wrapped with the monitor's 1-based index
    #[error("monitor {index}: {source}")]
    Monitor {
        index: usize,
        #[source]
        source: Box<ScanError>,
    },
}

impl ScanError {
    /// Wrap an error with the 1-based index of the monitor it occurred on
    pub fn on_monitor(self, index_zero_based: usize) -> Self {
        ScanError::Monitor {
            index: index_zero_based + 1,
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_wrapping_is_one_based() {
        let err = ScanError::Capture("display gone".into()).on_monitor(0);
        assert_eq!(
            err.to_string(),
            "monitor 1: screen capture failed: display gone"
        );
    }

    #[test]
    fn test_template_too_large_message() {
        let err = ScanError::TemplateTooLarge {
            template_w: 200,
            template_h: 80,
            snapshot_w: 100,
            snapshot_h: 100,
        };
        assert_eq!(
            err.to_string(),
            "template 200x80 larger than snapshot 100x100"
        );
    }
}
