// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detector service: model loading with fallback, and the per-request pipeline
//!
//! Built once at startup and shared with handlers through `Arc`. The chosen
//! detector and its [`ModelInfo`] never change afterwards.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info, warn};

use super::detection::{DetectionInput, DetectionResult, DetectorMode, ModelInfo};
use super::detector::{Detector, UnloadedDetector};
use super::image_utils::{
    decode_base64_image, decode_image_bytes, format_to_extension, ImageError, MAX_IMAGE_SIZE,
};
use super::normalizer::Normalizer;
use super::simulator::SimulatedDetector;
use super::yolo::{YoloConfig, YoloDetector, DEFAULT_IOU_THRESHOLD, YOLO_INPUT_SIZE};

pub const CUSTOM_MODEL_TYPE: &str = "Custom Basketball Model";
pub const PRETRAINED_MODEL_TYPE: &str = "YOLOv8n Pre-trained";

/// Default confidence threshold for detection requests
pub const DEFAULT_CONFIDENCE: f32 = 0.25;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Invalid image: {0}")]
    MalformedInput(#[from] ImageError),

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Detection task failed: {0}")]
    Internal(String),
}

/// Detector selection and request defaults
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Fine-tuned basketball model, tried first
    pub model_path: PathBuf,
    /// Stock COCO model, tried when the custom one fails
    pub fallback_model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    /// Use the simulator when no model loads
    pub demo_fallback: bool,
    pub exit_on_load_failure: bool,
    pub input_size: u32,
    pub iou_threshold: f32,
    pub default_confidence: f32,
    pub max_upload_bytes: usize,
    pub sort_by_confidence: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("trainon10kdataset/weights/best.onnx"),
            fallback_model_path: Some(PathBuf::from("yolov8n.onnx")),
            labels_path: None,
            demo_fallback: true,
            exit_on_load_failure: false,
            input_size: YOLO_INPUT_SIZE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            default_confidence: DEFAULT_CONFIDENCE,
            max_upload_bytes: MAX_IMAGE_SIZE,
            sort_by_confidence: true,
        }
    }
}

/// Shared detection pipeline: decode, detect, normalize
#[derive(Clone)]
pub struct DetectorService {
    detector: Arc<dyn Detector>,
    model_info: ModelInfo,
    normalizer: Normalizer,
    default_confidence: f32,
    max_upload_bytes: usize,
}

impl std::fmt::Debug for DetectorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorService")
            .field("mode", &self.detector.mode())
            .field("model_info", &self.model_info)
            .field("normalizer", &self.normalizer)
            .finish()
    }
}

impl DetectorService {
    /// Load the custom model, then the fallback, then degrade to demo or unavailable
    pub async fn load(config: &DetectorConfig) -> Self {
        let mut candidates = vec![(config.model_path.clone(), CUSTOM_MODEL_TYPE)];
        if let Some(ref fallback) = config.fallback_model_path {
            candidates.push((fallback.clone(), PRETRAINED_MODEL_TYPE));
        }

        let mut failures = Vec::new();
        for (path, model_type) in candidates {
            let yolo_config = YoloConfig {
                model_path: path.clone(),
                model_type: model_type.to_string(),
                labels_path: config.labels_path.clone(),
                input_size: config.input_size,
                iou_threshold: config.iou_threshold,
            };
            match YoloDetector::new(&yolo_config).await {
                Ok(detector) => {
                    info!("✅ {} ready ({})", model_type, path.display());
                    return Self::from_config(Arc::new(detector), config);
                }
                Err(e) => {
                    warn!("⚠️ Failed to load {} from {}: {:#}", model_type, path.display(), e);
                    failures.push(format!("{}: {:#}", path.display(), e));
                }
            }
        }

        let load_error = Some(failures.join("; "));
        if config.demo_fallback {
            warn!("🎭 No model could be loaded, running in DEMO mode");
            Self::from_config(Arc::new(SimulatedDetector::with_load_error(load_error)), config)
        } else {
            error!("❌ No model could be loaded and demo mode is disabled");
            Self::from_config(Arc::new(UnloadedDetector::new(load_error)), config)
        }
    }

    fn from_config(detector: Arc<dyn Detector>, config: &DetectorConfig) -> Self {
        Self::with_detector(detector, Normalizer::new(config.sort_by_confidence))
            .with_default_confidence(config.default_confidence)
            .with_max_upload_bytes(config.max_upload_bytes)
    }

    /// Wrap an already built detector
    pub fn with_detector(detector: Arc<dyn Detector>, normalizer: Normalizer) -> Self {
        let model_info = detector.describe();
        Self {
            detector,
            model_info,
            normalizer,
            default_confidence: DEFAULT_CONFIDENCE,
            max_upload_bytes: MAX_IMAGE_SIZE,
        }
    }

    pub fn with_default_confidence(mut self, confidence: f32) -> Self {
        self.default_confidence = confidence;
        self
    }

    pub fn with_max_upload_bytes(mut self, max_bytes: usize) -> Self {
        self.max_upload_bytes = max_bytes;
        self
    }

    /// Demo service without touching the filesystem
    pub fn demo() -> Self {
        Self::with_detector(Arc::new(SimulatedDetector::new()), Normalizer::default())
    }

    pub fn mode(&self) -> DetectorMode {
        self.detector.mode()
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }

    pub fn is_available(&self) -> bool {
        self.detector.is_available()
    }

    pub fn default_confidence(&self) -> f32 {
        self.default_confidence
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Name reported as `model` in detection results
    pub fn model_name(&self) -> String {
        self.model_info
            .model_type
            .clone()
            .unwrap_or_else(|| "none".to_string())
    }

    /// Decode an upload and run detection on the blocking pool
    ///
    /// # Errors
    /// - `ModelNotLoaded` when no detector is available
    /// - `MalformedInput` when the bytes are not a supported image
    ///
    /// Detector failures are not errors: they come back inside the result.
    pub async fn detect_bytes(
        &self,
        bytes: Vec<u8>,
        filename: String,
        confidence_threshold: f32,
    ) -> Result<DetectionResult, VisionError> {
        if !self.is_available() {
            return Err(VisionError::ModelNotLoaded);
        }

        let service = self.clone();
        tokio::task::spawn_blocking(move || {
            service.detect_bytes_blocking(&bytes, &filename, confidence_threshold)
        })
        .await
        .map_err(|e| VisionError::Internal(e.to_string()))?
    }

    /// Decode a base64 (or data URL) payload and run detection on the blocking pool
    ///
    /// Without a filename the upload is named `upload.<ext>` after its detected format.
    pub async fn detect_base64(
        &self,
        payload: String,
        filename: Option<String>,
        confidence_threshold: f32,
    ) -> Result<DetectionResult, VisionError> {
        if !self.is_available() {
            return Err(VisionError::ModelNotLoaded);
        }

        let service = self.clone();
        tokio::task::spawn_blocking(move || -> Result<DetectionResult, VisionError> {
            let (image, image_info) = decode_base64_image(&payload, service.max_upload_bytes)?;
            let filename = filename
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| format!("upload.{}", format_to_extension(image_info.format)));
            info!(
                "Processing base64 upload {} ({}x{}, {} bytes)",
                filename, image_info.width, image_info.height, image_info.size_bytes
            );
            Ok(service.detect_image(&DetectionInput::new(image, filename), confidence_threshold))
        })
        .await
        .map_err(|e| VisionError::Internal(e.to_string()))?
    }

    /// Synchronous form of [`detect_bytes`](Self::detect_bytes)
    pub fn detect_bytes_blocking(
        &self,
        bytes: &[u8],
        filename: &str,
        confidence_threshold: f32,
    ) -> Result<DetectionResult, VisionError> {
        if !self.is_available() {
            return Err(VisionError::ModelNotLoaded);
        }
        let (image, image_info) = decode_image_bytes(bytes, self.max_upload_bytes)?;
        info!(
            "Processing {} ({}x{}, {} bytes)",
            filename, image_info.width, image_info.height, image_info.size_bytes
        );
        Ok(self.detect_image(&DetectionInput::new(image, filename), confidence_threshold))
    }

    /// Run detection on a decoded image
    pub fn detect_image(&self, input: &DetectionInput, confidence_threshold: f32) -> DetectionResult {
        let started = Instant::now();
        let (width, height) = (input.width(), input.height());

        match self.detector.detect(input, confidence_threshold) {
            Ok(output) => {
                let detections = self.normalizer.normalize(&output.detections, width, height);
                DetectionResult {
                    count: detections.len(),
                    detections,
                    processing_time: started.elapsed() + output.latency_jitter,
                    image_width: width,
                    image_height: height,
                    model: self.model_name(),
                    mode: self.mode(),
                    error: None,
                }
            }
            Err(e) => {
                error!("Detection error on {}: {}", input.filename, e);
                DetectionResult::failed(
                    e.to_string(),
                    width,
                    height,
                    self.model_name(),
                    self.mode(),
                    started.elapsed(),
                )
            }
        }
    }

    /// Configured threshold when the request does not carry one
    pub fn resolve_confidence(&self, requested: Option<f32>) -> f32 {
        requested.unwrap_or(self.default_confidence)
    }
}
