// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object detection for basketball imagery
//!
//! This module provides:
//! - YOLO inference via ONNX Runtime (CPU)
//! - A seeded demo simulator used when no model can be loaded
//! - Normalization of detector output into one canonical schema
//!
//! [`DetectorService`] ties these together and is shared with the HTTP layer.

pub mod assembler;
pub mod detection;
pub mod detector;
pub mod image_utils;
pub mod legacy;
pub mod normalizer;
pub mod service;
pub mod simulator;
pub mod yolo;

pub use assembler::{ClassesReport, DetectionReport, HealthReport, ImageSize};
pub use detection::{
    BoundingBox, DetectionInput, DetectionResult, DetectorMode, ModelInfo, NormalizedDetection,
    RawDetection, BASKETBALL_CLASSES,
};
pub use detector::{Detector, DetectorError, DetectorOutput, UnloadedDetector};
pub use image_utils::{decode_base64_image, decode_image_bytes, detect_format, ImageError, ImageInfo};
pub use legacy::LegacyFormat;
pub use normalizer::Normalizer;
pub use service::{DetectorConfig, DetectorService, VisionError};
pub use simulator::SimulatedDetector;
pub use yolo::{YoloConfig, YoloDetector};
