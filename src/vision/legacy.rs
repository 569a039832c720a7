// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Older response shapes still consumed by the embeddable widget and scripts
//!
//! These are produced from normalized detections at the HTTP boundary only.

use std::str::FromStr;

use serde::Serialize;
use serde_json::{json, Value};

use super::detection::{ModelInfo, NormalizedDetection};

/// Output format requested by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegacyFormat {
    /// Canonical nested-bbox report
    #[default]
    Canonical,
    /// `[x1, y1, x2, y2, "class", confidence]` rows
    Tuples,
    /// `{"class", "class_id", "confidence", "bbox": [x1, y1, x2, y2]}` objects
    Flat,
}

impl FromStr for LegacyFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "canonical" | "default" => Ok(LegacyFormat::Canonical),
            "tuples" | "tuple" | "array" => Ok(LegacyFormat::Tuples),
            "flat" => Ok(LegacyFormat::Flat),
            other => Err(format!(
                "Unknown format '{}'. Expected one of: canonical, tuples, flat",
                other
            )),
        }
    }
}

/// Detections as `[x1, y1, x2, y2, class, confidence]` rows
pub fn to_tuples(detections: &[NormalizedDetection]) -> Value {
    Value::Array(
        detections
            .iter()
            .map(|d| {
                json!([
                    d.bbox.x1,
                    d.bbox.y1,
                    d.bbox.x2,
                    d.bbox.y2,
                    d.class_name,
                    d.confidence
                ])
            })
            .collect(),
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct FlatDetection {
    #[serde(rename = "class")]
    pub class_name: String,
    pub class_id: u32,
    pub confidence: f64,
    pub bbox: [u32; 4],
}

pub fn to_flat(detections: &[NormalizedDetection]) -> Vec<FlatDetection> {
    detections
        .iter()
        .map(|d| FlatDetection {
            class_name: d.class_name.clone(),
            class_id: d.class_id,
            confidence: d.confidence,
            bbox: d.bbox.corners(),
        })
        .collect()
}

/// `GET /health` body
#[derive(Debug, Clone, Serialize)]
pub struct LegacyHealth {
    pub status: &'static str,
    pub model_loaded: bool,
    pub model_classes: Option<Vec<String>>,
}

impl LegacyHealth {
    pub fn new(available: bool, info: &ModelInfo) -> Self {
        Self {
            status: "healthy",
            model_loaded: available,
            model_classes: available.then(|| info.classes.clone()),
        }
    }
}

/// `GET /model-info` body
#[derive(Debug, Clone, Serialize)]
pub struct LegacyModelInfo {
    pub model_type: String,
    pub classes: Vec<String>,
    pub num_classes: usize,
}

impl LegacyModelInfo {
    pub fn new(info: &ModelInfo) -> Self {
        Self {
            model_type: info.model_type.clone().unwrap_or_else(|| "YOLOv8".to_string()),
            classes: info.classes.clone(),
            num_classes: info.classes.len(),
        }
    }
}
