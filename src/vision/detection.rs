// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection data model shared by detectors, the normalizer and the API

use std::fmt;
use std::time::Duration;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Classes of the fine-tuned basketball model, in model output order
pub const BASKETBALL_CLASSES: &[&str] = &["Basketball-court", "ball", "made", "person", "rim", "shoot"];

/// One object as reported by a detector, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// [x1, y1, x2, y2] in source image pixels
    pub bbox: [f32; 4],
    pub class_id: u32,
    pub class_name: String,
    /// Confidence score (0.0-1.0)
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(bbox: [f32; 4], class_id: u32, class_name: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            class_name: class_name.into(),
            confidence,
        }
    }
}

/// Canonical bounding box with derived geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub width: u32,
    pub height: u32,
    pub center_x: u32,
    pub center_y: u32,
}

impl BoundingBox {
    /// Build from corner coordinates. Returns `None` unless `x1 <= x2` and `y1 <= y2`.
    pub fn from_corners(x1: u32, y1: u32, x2: u32, y2: u32) -> Option<Self> {
        if x1 > x2 || y1 > y2 {
            return None;
        }
        Some(Self {
            x1,
            y1,
            x2,
            y2,
            width: x2 - x1,
            height: y2 - y1,
            center_x: (x1 + x2) / 2,
            center_y: (y1 + y2) / 2,
        })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn corners(&self) -> [u32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// A detection after rounding, clamping and derivation of geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDetection {
    pub bbox: BoundingBox,
    #[serde(rename = "class")]
    pub class_name: String,
    pub class_id: u32,
    /// Confidence rounded to two decimal places
    pub confidence: f64,
    pub area: u64,
}

/// Which detector variant produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorMode {
    Real,
    Demo,
    Unavailable,
}

impl DetectorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorMode::Real => "real",
            DetectorMode::Demo => "demo",
            DetectorMode::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for DetectorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one detection request
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub detections: Vec<NormalizedDetection>,
    pub count: usize,
    pub processing_time: Duration,
    pub image_width: u32,
    pub image_height: u32,
    /// Model descriptor, e.g. "Custom Basketball Model" or "Demo Simulator"
    pub model: String,
    pub mode: DetectorMode,
    pub error: Option<String>,
}

impl DetectionResult {
    /// Empty result carrying a detector failure
    pub fn failed(
        error: impl Into<String>,
        image_width: u32,
        image_height: u32,
        model: impl Into<String>,
        mode: DetectorMode,
        processing_time: Duration,
    ) -> Self {
        Self {
            detections: Vec::new(),
            count: 0,
            processing_time,
            image_width,
            image_height,
            model: model.into(),
            mode,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Process-wide model description, fixed once the detector service is built
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub loaded: bool,
    pub model_type: Option<String>,
    pub classes: Vec<String>,
    pub load_time: Option<f64>,
    pub error: Option<String>,
}

/// Decoded image handed to a detector, with the name it was uploaded under
#[derive(Debug, Clone)]
pub struct DetectionInput {
    pub image: DynamicImage,
    pub filename: String,
}

impl DetectionInput {
    pub fn new(image: DynamicImage, filename: impl Into<String>) -> Self {
        Self {
            image,
            filename: filename.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
