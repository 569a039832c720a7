// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Detection endpoint tests
//!
//! These tests drive the router with `oneshot` and verify:
//! - Demo-mode detections over multipart and base64 uploads
//! - Request validation (missing file, extension, threshold, format)
//! - 503 when no model is loaded, 500 when the detector fails
//! - Legacy /detect tuples

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use dds70_detector::api::{create_app, ApiConfig, AppState};
use dds70_detector::vision::{
    DetectionInput, Detector, DetectorError, DetectorMode, DetectorOutput, DetectorService,
    ModelInfo, Normalizer, UnloadedDetector,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "dds70-test-boundary";

/// Detector whose inference always fails
struct FailingDetector;

impl Detector for FailingDetector {
    fn detect(&self, _input: &DetectionInput, _threshold: f32) -> Result<DetectorOutput, DetectorError> {
        Err(DetectorError::Invocation("onnx runtime exploded".to_string()))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn describe(&self) -> ModelInfo {
        ModelInfo {
            loaded: true,
            model_type: Some("Custom Basketball Model".to_string()),
            classes: vec!["ball".to_string()],
            load_time: Some(1.0),
            error: None,
        }
    }

    fn mode(&self) -> DetectorMode {
        DetectorMode::Real
    }
}

fn app(service: DetectorService) -> Router {
    create_app(AppState::new(Arc::new(service)), &ApiConfig::default())
}

fn demo_app() -> Router {
    app(DetectorService::demo())
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn multipart_body(field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(uri: &str, field: &str, filename: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(field, filename, data)))
        .unwrap()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Confidence as printed in the response body has at most two decimals
fn assert_two_decimals(confidence: &Value) {
    let text = confidence.to_string();
    let decimals = text.split_once('.').map_or(0, |(_, frac)| frac.len());
    assert!(decimals <= 2, "confidence printed as {}", text);
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[cfg(test)]
mod detect_endpoint_tests {
    use super::*;

    // =============================================================================
    // Multipart uploads
    // =============================================================================

    #[tokio::test]
    async fn test_demo_detect_returns_canonical_report() {
        let request = upload_request("/api/detect", "image", "basketball_01.png", &png_bytes(640, 480));
        let (status, body) = send(demo_app(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["mode"], "demo");
        assert_eq!(body["model"], "Demo Simulator");
        assert_eq!(body["image_size"], json!({"width": 640, "height": 480}));

        let detections = body["detections"].as_array().unwrap();
        assert_eq!(body["count"], detections.len());
        let balls: Vec<&Value> = detections.iter().filter(|d| d["class"] == "ball").collect();
        assert_eq!(balls.len(), 1);
        assert!(balls[0]["bbox"]["x2"].as_u64().unwrap() <= 640);
        assert!(body["processing_time"].as_f64().unwrap() >= 0.05);
    }

    #[tokio::test]
    async fn test_demo_detect_is_deterministic() {
        let bytes = png_bytes(800, 600);
        let (_, first) = send(
            demo_app(),
            upload_request("/api/detect", "image", "player_court_game.png", &bytes),
        )
        .await;
        let (_, second) = send(
            demo_app(),
            upload_request("/api/detect", "image", "player_court_game.png", &bytes),
        )
        .await;
        assert_eq!(first["detections"], second["detections"]);
    }

    #[tokio::test]
    async fn test_tuples_format() {
        let request = upload_request(
            "/api/detect?format=tuples",
            "image",
            "random.png",
            &png_bytes(640, 480),
        );
        let (status, body) = send(demo_app(), request).await;

        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].as_array().unwrap().len(), 6);
        assert_eq!(rows[0][4], "ball");
        assert_two_decimals(&rows[0][5]);

        let (_, canonical) = send(
            demo_app(),
            upload_request("/api/detect", "image", "random.png", &png_bytes(640, 480)),
        )
        .await;
        assert_eq!(rows[0][5], canonical["detections"][0]["confidence"]);
    }

    #[tokio::test]
    async fn test_flat_format() {
        let request = upload_request(
            "/api/detect?format=flat&confidence=0.5",
            "image",
            "random.png",
            &png_bytes(64, 64),
        );
        let (status, body) = send(demo_app(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["class"], "ball");
        assert_eq!(body[0]["bbox"].as_array().unwrap().len(), 4);
        assert_two_decimals(&body[0]["confidence"]);
    }

    #[tokio::test]
    async fn test_high_threshold_yields_empty_success() {
        let request = upload_request(
            "/api/detect?confidence=0.99",
            "image",
            "random.png",
            &png_bytes(64, 64),
        );
        let (status, body) = send(demo_app(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 0);
    }

    // =============================================================================
    // Validation
    // =============================================================================

    #[tokio::test]
    async fn test_missing_image_field() {
        let request = upload_request("/api/detect", "photo", "ball.png", &png_bytes(8, 8));
        let (status, body) = send(demo_app(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "No image file provided");
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_empty_filename() {
        let request = upload_request("/api/detect", "image", "", &png_bytes(8, 8));
        let (status, body) = send(demo_app(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file selected");
    }

    #[tokio::test]
    async fn test_bad_extension() {
        let request = upload_request("/api/detect", "image", "ball.tiff", &png_bytes(8, 8));
        let (status, body) = send(demo_app(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Unsupported file type"));
    }

    #[tokio::test]
    async fn test_confidence_out_of_range() {
        let request = upload_request(
            "/api/detect?confidence=1.5",
            "image",
            "ball.png",
            &png_bytes(8, 8),
        );
        let (status, body) = send(demo_app(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "confidence");
    }

    #[tokio::test]
    async fn test_unknown_format() {
        let request = upload_request("/api/detect?format=xml", "image", "ball.png", &png_bytes(8, 8));
        let (status, _) = send(demo_app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_numeric_confidence_is_json_error() {
        let request = upload_request(
            "/api/detect?confidence=abc",
            "image",
            "ball.png",
            &png_bytes(8, 8),
        );
        let (status, body) = send(demo_app(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error_type"], "invalid_request");

        let request = json_request(
            "/api/detect-base64?confidence=abc",
            json!({"image": STANDARD.encode(png_bytes(8, 8))}),
        );
        let (status, body) = send(demo_app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_type"], "invalid_request");
    }

    #[tokio::test]
    async fn test_undecodable_image() {
        let request = upload_request("/api/detect", "image", "ball.png", b"definitely not a png");
        let (status, body) = send(demo_app(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "image");
    }

    #[tokio::test]
    async fn test_oversized_image() {
        let service = DetectorService::demo().with_max_upload_bytes(16);
        let request = upload_request("/api/detect", "image", "ball.png", &png_bytes(64, 64));
        let (status, body) = send(app(service), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("too large"));
    }

    // =============================================================================
    // Detector state
    // =============================================================================

    #[tokio::test]
    async fn test_unloaded_model_returns_503() {
        let service = DetectorService::with_detector(
            Arc::new(UnloadedDetector::new(Some("best.onnx missing".to_string()))),
            Normalizer::default(),
        );
        let request = upload_request("/api/detect", "image", "ball.png", &png_bytes(8, 8));
        let (status, body) = send(app(service), request).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Model not loaded");
    }

    #[tokio::test]
    async fn test_detector_failure_returns_500_with_message() {
        let service = DetectorService::with_detector(Arc::new(FailingDetector), Normalizer::default());
        let request = upload_request("/api/detect", "image", "ball.png", &png_bytes(8, 8));
        let (status, body) = send(app(service), request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["count"], 0);
        assert!(body["error"].as_str().unwrap().contains("onnx runtime exploded"));
    }

    // =============================================================================
    // Base64 and legacy
    // =============================================================================

    #[tokio::test]
    async fn test_base64_data_url() {
        let payload = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(320, 240)));
        let request = json_request(
            "/api/detect-base64",
            json!({"image": payload, "filename": "court.png"}),
        );
        let (status, body) = send(demo_app(), request).await;

        assert_eq!(status, StatusCode::OK);
        let court = body["detections"]
            .as_array()
            .unwrap()
            .iter()
            .find(|d| d["class"] == "Basketball-court")
            .cloned()
            .unwrap();
        assert_eq!(court["bbox"]["x1"], 10);
        assert_eq!(court["bbox"]["x2"], 310);
        assert_eq!(court["bbox"]["y2"], 230);
    }

    #[tokio::test]
    async fn test_base64_missing_image() {
        let request = json_request("/api/detect-base64", json!({"filename": "a.png"}));
        let (status, body) = send(demo_app(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No base64 image data provided");
    }

    #[tokio::test]
    async fn test_base64_invalid_encoding() {
        let request = json_request("/api/detect-base64", json!({"image": "@@@not-base64@@@"}));
        let (status, _) = send(demo_app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_legacy_detect_returns_tuples() {
        let request = upload_request("/detect", "image_file", "basketball.png", &png_bytes(640, 480));
        let (status, body) = send(demo_app(), request).await;

        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert!(!rows.is_empty());
        for row in rows {
            let row = row.as_array().unwrap();
            assert_eq!(row.len(), 6);
            assert!(row[4].is_string());
            assert!(row[5].as_f64().unwrap() <= 1.0);
            assert_two_decimals(&row[5]);
        }
    }

    #[tokio::test]
    async fn test_legacy_detect_wrong_field() {
        let request = upload_request("/detect", "image", "basketball.png", &png_bytes(8, 8));
        let (status, _) = send(demo_app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
