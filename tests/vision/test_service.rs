// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Detector service tests
//!
//! Verifies model loading fallbacks and the decode → detect → normalize
//! pipeline with injected detectors.

use dds70_detector::vision::{
    DetectionInput, Detector, DetectorConfig, DetectorError, DetectorMode, DetectorOutput,
    DetectorService, ModelInfo, Normalizer, RawDetection, VisionError,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::sync::Arc;

/// Detector that always finds nothing
struct EmptyDetector;

impl Detector for EmptyDetector {
    fn detect(&self, _input: &DetectionInput, _threshold: f32) -> Result<DetectorOutput, DetectorError> {
        Ok(DetectorOutput::new(Vec::new()))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn describe(&self) -> ModelInfo {
        ModelInfo {
            loaded: true,
            model_type: Some("Empty".to_string()),
            classes: vec!["ball".to_string()],
            load_time: Some(0.0),
            error: None,
        }
    }

    fn mode(&self) -> DetectorMode {
        DetectorMode::Real
    }
}

/// Detector that echoes boxes exceeding the image, in ascending confidence
struct ScriptedDetector;

impl Detector for ScriptedDetector {
    fn detect(&self, input: &DetectionInput, threshold: f32) -> Result<DetectorOutput, DetectorError> {
        let (w, h) = (input.width() as f32, input.height() as f32);
        let detections = vec![
            RawDetection::new([-5.0, -5.0, w / 2.0, h / 2.0], 3, "person", 0.31),
            RawDetection::new([w / 4.0, h / 4.0, w + 20.0, h + 20.0], 1, "ball", 0.876),
        ]
        .into_iter()
        .filter(|d| d.confidence >= threshold)
        .collect();
        Ok(DetectorOutput::new(detections))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn describe(&self) -> ModelInfo {
        ModelInfo {
            loaded: true,
            model_type: Some("Scripted".to_string()),
            ..ModelInfo::default()
        }
    }

    fn mode(&self) -> DetectorMode {
        DetectorMode::Real
    }
}

fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut buf, ImageFormat::Jpeg)
        .unwrap();
    buf.into_inner()
}

#[cfg(test)]
mod service_tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_result_is_not_an_error() {
        let service = DetectorService::with_detector(Arc::new(EmptyDetector), Normalizer::default());
        let result = service
            .detect_bytes(jpeg_bytes(32, 32), "frame.jpg".to_string(), 0.25)
            .await
            .unwrap();

        assert_eq!(result.count, 0);
        assert!(result.detections.is_empty());
        assert!(result.error.is_none());
        assert_eq!(result.model, "Empty");
    }

    #[tokio::test]
    async fn test_scripted_detections_are_clamped_and_sorted() {
        let service = DetectorService::with_detector(Arc::new(ScriptedDetector), Normalizer::default());
        let result = service
            .detect_bytes(jpeg_bytes(200, 100), "frame.jpg".to_string(), 0.25)
            .await
            .unwrap();

        assert_eq!(result.count, 2);
        let ball = &result.detections[0];
        assert_eq!(ball.class_name, "ball");
        assert_eq!(ball.confidence, 0.88);
        assert_eq!(ball.bbox.corners(), [50, 25, 200, 100]);

        let person = &result.detections[1];
        assert_eq!(person.bbox.corners(), [0, 0, 100, 50]);
        assert_eq!(person.bbox.center_x, 50);
    }

    #[tokio::test]
    async fn test_threshold_reaches_detector() {
        let service = DetectorService::with_detector(Arc::new(ScriptedDetector), Normalizer::default());
        let result = service
            .detect_bytes(jpeg_bytes(200, 100), "frame.jpg".to_string(), 0.5)
            .await
            .unwrap();
        assert_eq!(result.count, 1);
    }

    #[tokio::test]
    async fn test_corrupt_upload_is_malformed_input() {
        let mut bytes = jpeg_bytes(16, 16);
        bytes.truncate(12);
        let service = DetectorService::demo();
        let err = service
            .detect_bytes(bytes, "ball.jpg".to_string(), 0.25)
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn test_load_failure_records_every_path() {
        let dir = tempfile::tempdir().unwrap();
        let fake_model = dir.path().join("best.onnx");
        std::fs::write(&fake_model, b"not an onnx graph").unwrap();

        let config = DetectorConfig {
            model_path: fake_model,
            fallback_model_path: Some(dir.path().join("missing.onnx")),
            ..DetectorConfig::default()
        };
        let service = DetectorService::load(&config).await;

        assert_eq!(service.mode(), DetectorMode::Demo);
        let error = service.model_info().error.clone().unwrap();
        assert!(error.contains("best.onnx"));
        assert!(error.contains("missing.onnx"));
    }

    #[tokio::test]
    async fn test_load_without_demo_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = DetectorConfig {
            model_path: dir.path().join("best.onnx"),
            fallback_model_path: None,
            demo_fallback: false,
            ..DetectorConfig::default()
        };
        let service = DetectorService::load(&config).await;

        assert_eq!(service.mode(), DetectorMode::Unavailable);
        assert!(!service.model_info().loaded);
        let err = service
            .detect_bytes(jpeg_bytes(8, 8), "a.jpg".to_string(), 0.25)
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::ModelNotLoaded));
    }
}
