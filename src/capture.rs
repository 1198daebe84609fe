//! Monitor enumeration and region capture
//!
//! `ScreenCapture` is the seam between the scan loop and the platform:
//! enumeration and capture live behind one trait so the loop can run
//! against scripted fakes in tests. The production implementation rides
//! on xcap, which handles the per-platform capture APIs.

use image::GrayImage;
use tracing::debug;

use crate::error::ScanError;
use crate::types::MonitorGeometry;

pub trait ScreenCapture {
    /// Current display geometries, indices assigned in enumeration order.
    /// Queried fresh every scan cycle so hot-plugged monitors are seen
    /// without a restart.
    fn monitors(&mut self) -> Result<Vec<MonitorGeometry>, ScanError>;

    /// Grayscale snapshot of exactly `region`'s rectangle
    fn capture(&mut self, region: &MonitorGeometry) -> Result<GrayImage, ScanError>;
}

/// xcap-backed capture session, alive for one monitor loop
pub struct XcapScreen;

impl XcapScreen {
    pub fn new() -> Self {
        Self
    }
}

impl Default for XcapScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenCapture for XcapScreen {
    fn monitors(&mut self) -> Result<Vec<MonitorGeometry>, ScanError> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| ScanError::Capture(format!("monitor enumeration failed: {e}")))?;

        let mut geometries = Vec::with_capacity(monitors.len());
        for (index, monitor) in monitors.iter().enumerate() {
            geometries.push(MonitorGeometry {
                index,
                x: monitor
                    .x()
                    .map_err(|e| ScanError::Capture(e.to_string()))?,
                y: monitor
                    .y()
                    .map_err(|e| ScanError::Capture(e.to_string()))?,
                width: monitor
                    .width()
                    .map_err(|e| ScanError::Capture(e.to_string()))?,
                height: monitor
                    .height()
                    .map_err(|e| ScanError::Capture(e.to_string()))?,
            });
        }
        Ok(geometries)
    }

    fn capture(&mut self, region: &MonitorGeometry) -> Result<GrayImage, ScanError> {
        // Re-resolve by geometry rather than trusting the enumeration index:
        // the monitor may have been unplugged since the caller listed it.
        let monitors = xcap::Monitor::all()
            .map_err(|e| ScanError::Capture(format!("monitor enumeration failed: {e}")))?;

        let monitor = monitors
            .into_iter()
            .find(|m| {
                m.x().is_ok_and(|x| x == region.x)
                    && m.y().is_ok_and(|y| y == region.y)
                    && m.width().is_ok_and(|w| w == region.width)
                    && m.height().is_ok_and(|h| h == region.height)
            })
            .ok_or_else(|| {
                ScanError::Capture(format!(
                    "monitor at ({}, {}) {}x{} no longer present",
                    region.x, region.y, region.width, region.height
                ))
            })?;

        let shot = monitor
            .capture_image()
            .map_err(|e| ScanError::Capture(e.to_string()))?;
        let (width, height) = (shot.width(), shot.height());
        debug!(width = width, height = height, "captured monitor snapshot");
        Ok(gray_from_rgba(&shot.into_raw(), width, height))
    }
}

/// Collapse RGBA pixels to luminance with the BT.601 weights; matching is
/// luminance-only.
fn gray_from_rgba(rgba: &[u8], width: u32, height: u32) -> GrayImage {
    let mut gray = Vec::with_capacity((width * height) as usize);
    for px in rgba.chunks_exact(4) {
        let lum =
            0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2]);
        gray.push(lum as u8);
    }
    GrayImage::from_raw(width, height, gray)
        .expect("luma buffer length matches dimensions")
}
