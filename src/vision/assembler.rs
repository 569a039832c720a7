// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Response payloads built from detection results and model state

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::detection::{DetectionResult, DetectorMode, ModelInfo, NormalizedDetection};
use super::simulator::{demo_taxonomy, DemoTaxonomy};
use crate::version::get_version_info;

pub const SERVICE_NAME: &str = "Basketball Object Detection API";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Canonical detection payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub success: bool,
    pub detections: Vec<NormalizedDetection>,
    pub count: usize,
    /// Seconds, three decimal places
    pub processing_time: f64,
    pub image_size: ImageSize,
    pub model: String,
    pub mode: DetectorMode,
    /// RFC 3339
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionReport {
    pub fn from_result(result: DetectionResult) -> Self {
        Self {
            success: result.error.is_none(),
            count: result.count,
            processing_time: round_seconds(result.processing_time.as_secs_f64()),
            image_size: ImageSize {
                width: result.image_width,
                height: result.image_height,
            },
            model: result.model,
            mode: result.mode,
            timestamp: Utc::now().to_rfc3339(),
            error: result.error,
            detections: result.detections,
        }
    }
}

/// Health check payload
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// "healthy" when a detector answers, "degraded" otherwise
    pub status: &'static str,
    pub service: &'static str,
    pub version: serde_json::Value,
    pub timestamp: String,
    pub mode: DetectorMode,
    pub model: ModelInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_taxonomy: Option<DemoTaxonomy>,
}

impl HealthReport {
    pub fn new(mode: DetectorMode, model: &ModelInfo) -> Self {
        Self {
            status: match mode {
                DetectorMode::Unavailable => "degraded",
                DetectorMode::Real | DetectorMode::Demo => "healthy",
            },
            service: SERVICE_NAME,
            version: get_version_info(),
            timestamp: Utc::now().to_rfc3339(),
            mode,
            model: model.clone(),
            demo_taxonomy: (mode == DetectorMode::Demo).then(demo_taxonomy),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassesReport {
    pub success: bool,
    pub classes: Vec<String>,
    pub count: usize,
}

impl ClassesReport {
    pub fn new(classes: &[String]) -> Self {
        Self {
            success: true,
            classes: classes.to_vec(),
            count: classes.len(),
        }
    }
}

fn round_seconds(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}
