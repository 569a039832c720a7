// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection endpoint handlers

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::Response,
    Json,
};
use axum_extra::extract::Multipart;
use tracing::{debug, info, warn};

use super::request::{validate_confidence, validate_upload_filename, Base64DetectRequest, DetectQuery};
use super::response::render_detection;
use crate::api::errors::ApiError;
use crate::api::server::AppState;
use crate::vision::{DetectionResult, LegacyFormat};

/// Multipart field carrying the image on `/api/detect`
pub const IMAGE_FIELD: &str = "image";

/// Multipart field carrying the image on the legacy `/detect`
pub const LEGACY_IMAGE_FIELD: &str = "image_file";

struct Upload {
    filename: Option<String>,
    bytes: Vec<u8>,
}

/// Pull the named file field out of a multipart body
async fn read_upload(mut multipart: Multipart, field_name: &str) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(field_name) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to read upload: {}", e)))?;

        return Ok(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    Err(ApiError::validation(field_name, "No image file provided"))
}

fn ensure_available(state: &AppState) -> Result<(), ApiError> {
    if state.detector.is_available() {
        Ok(())
    } else {
        warn!("Detection requested but no model is loaded");
        Err(ApiError::ServiceUnavailable("Model not loaded".to_string()))
    }
}

fn query_error(rejection: QueryRejection) -> ApiError {
    ApiError::InvalidRequest(rejection.body_text())
}

fn log_result(result: &DetectionResult) {
    info!(
        "Detection complete: {} objects, {:.3}s, mode={}",
        result.count,
        result.processing_time.as_secs_f64(),
        result.mode
    );
}

/// POST /api/detect - Detect objects in an uploaded image
///
/// # Request
/// - multipart field `image`: the image file (png, jpg, jpeg, gif, bmp, webp)
/// - `?confidence=`: threshold in [0, 1], defaults to the server setting
/// - `?format=`: `canonical` (default), `tuples` or `flat`
///
/// # Errors
/// - 400 Bad Request: missing file, empty filename, bad extension, bad threshold, undecodable image
/// - 503 Service Unavailable: model not loaded and demo mode disabled
/// - 500 Internal Server Error: detector failure (message preserved)
pub async fn detect_handler(
    State(state): State<AppState>,
    query: Result<Query<DetectQuery>, QueryRejection>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    ensure_available(&state)?;

    let Query(query) = query.map_err(query_error)?;
    let format = query.format()?;
    validate_confidence(query.confidence)?;

    let upload = read_upload(multipart, IMAGE_FIELD).await?;
    let filename = validate_upload_filename(upload.filename.as_deref())?;
    debug!("Upload received: {} ({} bytes)", filename, upload.bytes.len());

    let confidence = state.detector.resolve_confidence(query.confidence);
    let result = state
        .detector
        .detect_bytes(upload.bytes, filename, confidence)
        .await?;

    log_result(&result);
    Ok(render_detection(result, format))
}

/// POST /api/detect-base64 - Detect objects in a base64-encoded image
///
/// Body: `{"image": "<base64 or data URL>", "filename": "optional.png", "confidence": 0.25}`.
/// A `confidence` in the body wins over the query string.
pub async fn detect_base64_handler(
    State(state): State<AppState>,
    query: Result<Query<DetectQuery>, QueryRejection>,
    body: Result<Json<Base64DetectRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    ensure_available(&state)?;

    let Query(query) = query.map_err(query_error)?;
    let Json(request) = body.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let format = query.format()?;
    validate_confidence(query.confidence)?;
    let image = request.validate()?.to_string();

    let confidence = state
        .detector
        .resolve_confidence(request.confidence.or(query.confidence));
    let result = state
        .detector
        .detect_base64(image, request.filename.clone(), confidence)
        .await?;

    log_result(&result);
    Ok(render_detection(result, format))
}

/// POST /detect - Legacy upload endpoint returning `[x1, y1, x2, y2, class, confidence]` rows
pub async fn legacy_detect_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    ensure_available(&state)?;

    let upload = read_upload(multipart, LEGACY_IMAGE_FIELD).await?;
    let filename = upload
        .filename
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::validation(LEGACY_IMAGE_FIELD, "No file selected"))?;

    let confidence = state.detector.default_confidence();
    let result = state
        .detector
        .detect_bytes(upload.bytes, filename, confidence)
        .await?;

    log_result(&result);
    Ok(render_detection(result, LegacyFormat::Tuples))
}
