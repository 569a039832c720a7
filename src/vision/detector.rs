// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detector capability shared by the ONNX model and the demo simulator

use std::time::Duration;

use thiserror::Error;

use super::detection::{DetectionInput, DetectorMode, ModelInfo, RawDetection};

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Model not loaded")]
    Unavailable,

    #[error("Detection failed: {0}")]
    Invocation(String),
}

impl From<anyhow::Error> for DetectorError {
    fn from(err: anyhow::Error) -> Self {
        DetectorError::Invocation(format!("{:#}", err))
    }
}

/// Raw detector output for a single image
#[derive(Debug, Clone, Default)]
pub struct DetectorOutput {
    pub detections: Vec<RawDetection>,
    /// Extra time to report on top of measured wall clock (simulator only)
    pub latency_jitter: Duration,
}

impl DetectorOutput {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            detections,
            latency_jitter: Duration::ZERO,
        }
    }
}

/// Turns an image into labelled boxes.
///
/// Implementations are called from the blocking thread pool and may take
/// seconds. They must not keep per-request state between calls.
pub trait Detector: Send + Sync {
    fn detect(
        &self,
        input: &DetectionInput,
        confidence_threshold: f32,
    ) -> Result<DetectorOutput, DetectorError>;

    fn is_available(&self) -> bool;

    fn describe(&self) -> ModelInfo;

    fn mode(&self) -> DetectorMode;
}

/// Placeholder used when no model loaded and demo mode is off
#[derive(Debug, Clone)]
pub struct UnloadedDetector {
    load_error: Option<String>,
}

impl UnloadedDetector {
    pub fn new(load_error: Option<String>) -> Self {
        Self { load_error }
    }
}

impl Detector for UnloadedDetector {
    fn detect(&self, _input: &DetectionInput, _threshold: f32) -> Result<DetectorOutput, DetectorError> {
        Err(DetectorError::Unavailable)
    }

    fn is_available(&self) -> bool {
        false
    }

    fn describe(&self) -> ModelInfo {
        ModelInfo {
            loaded: false,
            model_type: None,
            classes: Vec::new(),
            load_time: None,
            error: self.load_error.clone(),
        }
    }

    fn mode(&self) -> DetectorMode {
        DetectorMode::Unavailable
    }
}
