// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the basketball detection service

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-onnx-detector-2026-10-19";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2026-10-19";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "onnx-yolo",
    "custom-basketball-model",
    "coco-fallback-model",
    "demo-simulator",
    "base64-upload",
    "legacy-routes",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("DDS70 Detector {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info for API responses
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}
