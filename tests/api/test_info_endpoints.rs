// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Health, model metadata and fallback route tests

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use dds70_detector::api::{create_app, ApiConfig, AppState};
use dds70_detector::vision::{DetectorService, Normalizer, UnloadedDetector};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

fn demo_app() -> Router {
    create_app(
        AppState::new(Arc::new(DetectorService::demo())),
        &ApiConfig::default(),
    )
}

fn unloaded_app() -> Router {
    let service = DetectorService::with_detector(
        Arc::new(UnloadedDetector::new(Some("YOLO model not found".to_string()))),
        Normalizer::default(),
    );
    create_app(AppState::new(Arc::new(service)), &ApiConfig::default())
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[cfg(test)]
mod info_endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_in_demo_mode() {
        let (status, body) = get(demo_app(), "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["mode"], "demo");
        assert_eq!(body["service"], "Basketball Object Detection API");
        assert_eq!(body["model"]["loaded"], false);
        assert!(body["version"]["version"].is_string());
        assert!(body["demo_taxonomy"].is_object());
    }

    #[tokio::test]
    async fn test_health_without_model() {
        let (status, body) = get(unloaded_app(), "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["mode"], "unavailable");
        assert_eq!(body["model"]["error"], "YOLO model not found");
        assert!(body.get("demo_taxonomy").is_none());
    }

    #[tokio::test]
    async fn test_model_info() {
        let (status, body) = get(demo_app(), "/api/model-info").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_type"], "Demo Simulator");
        assert_eq!(body["classes"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_classes() {
        let (status, body) = get(demo_app(), "/api/classes").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 6);
        assert!(body["classes"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c == "Basketball-court"));
    }

    #[tokio::test]
    async fn test_classes_without_model() {
        let (status, body) = get(unloaded_app(), "/api/classes").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error_type"], "service_unavailable");
    }

    #[tokio::test]
    async fn test_unknown_route_lists_endpoints() {
        let (status, body) = get(demo_app(), "/api/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["details"]["path"], "/api/nope");
        let endpoints = body["details"]["available_endpoints"].as_array().unwrap();
        assert!(endpoints.iter().any(|e| e == "/api/detect"));
    }

    #[tokio::test]
    async fn test_legacy_health() {
        let (status, body) = get(demo_app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model_loaded"], true);
        assert_eq!(body["model_classes"].as_array().unwrap().len(), 6);

        let (_, body) = get(unloaded_app(), "/health").await;
        assert_eq!(body["model_loaded"], false);
        assert!(body["model_classes"].is_null());
    }

    #[tokio::test]
    async fn test_legacy_model_info() {
        let (status, body) = get(demo_app(), "/model-info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["num_classes"], 6);

        let (status, _) = get(unloaded_app(), "/model-info").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
