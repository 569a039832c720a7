// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Maps raw detector output onto the canonical detection schema

use tracing::{info, warn};

use super::detection::{BoundingBox, NormalizedDetection, RawDetection};

/// Decimal places kept on confidence scores
pub const CONFIDENCE_PRECISION: i32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    sort_by_confidence: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            sort_by_confidence: true,
        }
    }
}

impl Normalizer {
    pub fn new(sort_by_confidence: bool) -> Self {
        Self { sort_by_confidence }
    }

    pub fn sorts_by_confidence(&self) -> bool {
        self.sort_by_confidence
    }

    /// Round, clamp and derive geometry for every raw detection.
    ///
    /// Boxes that are non-finite or inverted after rounding are dropped with a
    /// warning. The confidence sort is stable, so ties keep detector order.
    pub fn normalize(
        &self,
        raw: &[RawDetection],
        image_width: u32,
        image_height: u32,
    ) -> Vec<NormalizedDetection> {
        let mut detections: Vec<NormalizedDetection> = raw
            .iter()
            .enumerate()
            .filter_map(|(idx, det)| normalize_one(idx, det, image_width, image_height))
            .collect();

        if self.sort_by_confidence {
            detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        }

        info!("Detected {} objects", detections.len());
        detections
    }
}

fn normalize_one(
    idx: usize,
    det: &RawDetection,
    image_width: u32,
    image_height: u32,
) -> Option<NormalizedDetection> {
    if !det.confidence.is_finite() {
        warn!(
            "Dropping detection #{} ({}): non-finite confidence {}",
            idx, det.class_name, det.confidence
        );
        return None;
    }

    let [x1, y1, x2, y2] = det.bbox;
    let (Some(x1), Some(y1), Some(x2), Some(y2)) = (
        round_coord(x1, image_width),
        round_coord(y1, image_height),
        round_coord(x2, image_width),
        round_coord(y2, image_height),
    ) else {
        warn!(
            "Dropping detection #{} ({}): non-finite box {:?}",
            idx, det.class_name, det.bbox
        );
        return None;
    };

    let Some(bbox) = BoundingBox::from_corners(x1, y1, x2, y2) else {
        warn!(
            "Dropping detection #{} ({}): inverted box [{}, {}, {}, {}]",
            idx, det.class_name, x1, y1, x2, y2
        );
        return None;
    };

    Some(NormalizedDetection {
        area: bbox.area(),
        bbox,
        class_name: det.class_name.clone(),
        class_id: det.class_id,
        confidence: round_confidence(det.confidence),
    })
}

/// Round half away from zero, then clamp into `[0, limit]`
fn round_coord(value: f32, limit: u32) -> Option<u32> {
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(0.0, limit as f32) as u32)
}

/// Clamp to [0, 1] and keep [`CONFIDENCE_PRECISION`] decimal places
///
/// Rounded in `f64` so JSON output carries exactly that many digits.
pub fn round_confidence(confidence: f32) -> f64 {
    let scale = 10f64.powi(CONFIDENCE_PRECISION);
    (f64::from(confidence).clamp(0.0, 1.0) * scale).round() / scale
}
