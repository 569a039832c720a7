// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Rendering of detection results in the requested format

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::api::errors::ApiError;
use crate::vision::legacy::{to_flat, to_tuples};
use crate::vision::{DetectionReport, DetectionResult, LegacyFormat};

/// Build the HTTP response for one detection result
///
/// A result carrying a detector error is answered with 500. The canonical
/// format keeps the full report so clients still see `image_size` and `mode`.
pub fn render_detection(result: DetectionResult, format: LegacyFormat) -> Response {
    match (format, result.error.clone()) {
        (LegacyFormat::Canonical, error) => {
            let status = if error.is_some() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            (status, Json(DetectionReport::from_result(result))).into_response()
        }
        (_, Some(error)) => ApiError::InternalError(error).into_response(),
        (LegacyFormat::Tuples, None) => Json(to_tuples(&result.detections)).into_response(),
        (LegacyFormat::Flat, None) => Json(to_flat(&result.detections)).into_response(),
    }
}
