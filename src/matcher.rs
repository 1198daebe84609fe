//! Template matching
//!
//! Normalized cross-correlation between the fixed button template and a
//! grayscale monitor snapshot. Single template, single scale, no rotation:
//! the search walks every integer offset where the template fully fits and
//! keeps the globally best correlation.

use image::GrayImage;
use std::path::Path;

use crate::constants::matching;
use crate::error::ScanError;
use crate::types::{ClickPoint, MonitorGeometry};

/// The button reference image, grayscale, loaded once per monitor loop
pub struct Template {
    image: GrayImage,
    /// Sum of squared intensities, precomputed for the correlation denominator
    energy: f64,
}

impl Template {
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let image = image::open(path)
            .map_err(|e| ScanError::Template(format!("{}: {}", path.display(), e)))?
            .to_luma8();
        Self::from_image(image)
    }

    pub fn from_image(image: GrayImage) -> Result<Self, ScanError> {
        let energy: f64 = image
            .as_raw()
            .iter()
            .map(|&p| f64::from(p) * f64::from(p))
            .sum();
        if energy == 0.0 {
            return Err(ScanError::Template(
                "template is entirely black, nothing to correlate against".into(),
            ));
        }
        Ok(Self { image, energy })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Best alignment of the template within one snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Correlation score in [0, 1] (floating point may exceed 1 marginally)
    pub confidence: f64,
    /// Top-left offset of the matched region within the snapshot
    pub x: u32,
    pub y: u32,
}

impl MatchResult {
    /// Whether the score clears the fixed click threshold
    pub fn is_actionable(&self) -> bool {
        self.confidence > matching::CONFIDENCE_THRESHOLD
    }

    /// Global-screen coordinate of the matched region's center
    pub fn click_point(&self, monitor: &MonitorGeometry, template: &Template) -> ClickPoint {
        ClickPoint {
            x: monitor.x + self.x as i32 + (template.width() / 2) as i32,
            y: monitor.y + self.y as i32 + (template.height() / 2) as i32,
        }
    }
}

/// Correlate `template` against every valid offset of `snapshot` and return
/// the best alignment.
///
/// Score per offset: `sum(T * S) / sqrt(sum(T^2) * sum(S^2))` over the
/// template footprint. Patch energies come from a summed-area table; a
/// zero-energy patch scores 0. Ties resolve to the first-found offset in
/// row-major order (strictly-greater comparison), which keeps the result
/// deterministic.
pub fn match_template(snapshot: &GrayImage, template: &Template) -> Result<MatchResult, ScanError> {
    let (sw, sh) = snapshot.dimensions();
    let (tw, th) = (template.width(), template.height());
    if tw > sw || th > sh {
        return Err(ScanError::TemplateTooLarge {
            template_w: tw,
            template_h: th,
            snapshot_w: sw,
            snapshot_h: sh,
        });
    }

    let (sw, sh) = (sw as usize, sh as usize);
    let (tw, th) = (tw as usize, th as usize);
    let snap = snapshot.as_raw();
    let tpl = template.image.as_raw();
    let tpl_norm = template.energy.sqrt();
    let sq = squared_integral(snap, sw, sh);

    let mut best = MatchResult {
        confidence: -1.0,
        x: 0,
        y: 0,
    };
    for y in 0..=(sh - th) {
        for x in 0..=(sw - tw) {
            let patch_energy = patch_energy(&sq, sw + 1, x, y, tw, th);
            let score = if patch_energy == 0 {
                0.0
            } else {
                let mut cross = 0u64;
                for j in 0..th {
                    let snap_row = (y + j) * sw + x;
                    let tpl_row = j * tw;
                    for i in 0..tw {
                        cross += u64::from(tpl[tpl_row + i]) * u64::from(snap[snap_row + i]);
                    }
                }
                cross as f64 / (tpl_norm * (patch_energy as f64).sqrt())
            };
            if score > best.confidence {
                best = MatchResult {
                    confidence: score,
                    x: x as u32,
                    y: y as u32,
                };
            }
        }
    }
    Ok(best)
}

/// Summed-area table of squared intensities, padded by one row/column of
/// zeros so patch sums need no boundary cases.
fn squared_integral(raw: &[u8], width: usize, height: usize) -> Vec<u64> {
    let stride = width + 1;
    let mut table = vec![0u64; stride * (height + 1)];
    for y in 0..height {
        let mut row_sum = 0u64;
        for x in 0..width {
            let v = u64::from(raw[y * width + x]);
            row_sum += v * v;
            table[(y + 1) * stride + (x + 1)] = table[y * stride + (x + 1)] + row_sum;
        }
    }
    table
}

fn patch_energy(table: &[u64], stride: usize, x: usize, y: usize, w: usize, h: usize) -> u64 {
    table[(y + h) * stride + (x + w)] + table[y * stride + x]
        - table[y * stride + (x + w)]
        - table[(y + h) * stride + x]
}
