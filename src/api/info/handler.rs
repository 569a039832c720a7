// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Health and model metadata handlers

use axum::{extract::State, http::Uri, Json};

use crate::api::errors::ApiError;
use crate::api::server::{AppState, AVAILABLE_ENDPOINTS};
use crate::vision::legacy::{LegacyHealth, LegacyModelInfo};
use crate::vision::{ClassesReport, HealthReport, ModelInfo};

/// GET /api/health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport::new(
        state.detector.mode(),
        state.detector.model_info(),
    ))
}

/// GET /api/model-info
pub async fn model_info_handler(State(state): State<AppState>) -> Json<ModelInfo> {
    Json(state.detector.model_info().clone())
}

/// GET /api/classes - 503 when no detector is available
pub async fn classes_handler(
    State(state): State<AppState>,
) -> Result<Json<ClassesReport>, ApiError> {
    if !state.detector.is_available() {
        return Err(ApiError::ServiceUnavailable("Model not loaded".to_string()));
    }
    Ok(Json(ClassesReport::new(&state.detector.model_info().classes)))
}

/// GET /health (legacy)
pub async fn legacy_health_handler(State(state): State<AppState>) -> Json<LegacyHealth> {
    Json(LegacyHealth::new(
        state.detector.is_available(),
        state.detector.model_info(),
    ))
}

/// GET /model-info (legacy)
pub async fn legacy_model_info_handler(
    State(state): State<AppState>,
) -> Result<Json<LegacyModelInfo>, ApiError> {
    if !state.detector.is_available() {
        return Err(ApiError::ServiceUnavailable("Model not loaded".to_string()));
    }
    Ok(Json(LegacyModelInfo::new(state.detector.model_info())))
}

/// Fallback for unknown routes
pub async fn not_found_handler(uri: Uri) -> ApiError {
    ApiError::NotFound {
        path: uri.path().to_string(),
        available_endpoints: AVAILABLE_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
    }
}
