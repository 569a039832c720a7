// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection request types and validation

use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::vision::image_utils::validate_extension;
use crate::vision::LegacyFormat;

/// Query string accepted by the detection endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectQuery {
    /// Confidence threshold (0.0-1.0); server default when absent
    #[serde(default)]
    pub confidence: Option<f32>,

    /// Response format: canonical (default), tuples or flat
    #[serde(default)]
    pub format: Option<String>,
}

impl DetectQuery {
    pub fn format(&self) -> Result<LegacyFormat, ApiError> {
        self.format
            .as_deref()
            .unwrap_or_default()
            .parse::<LegacyFormat>()
            .map_err(|message| ApiError::validation("format", message))
    }
}

/// JSON body for `POST /api/detect-base64`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Base64DetectRequest {
    /// Base64 image data, optionally as a `data:image/...;base64,` URL
    #[serde(default)]
    pub image: Option<String>,

    /// Name used for demo-mode seeding; derived from the image format when absent
    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub confidence: Option<f32>,
}

impl Base64DetectRequest {
    /// Validate the request and return the image payload
    pub fn validate(&self) -> Result<&str, ApiError> {
        let image = self
            .image
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ApiError::validation("image", "No base64 image data provided"))?;

        validate_confidence(self.confidence)?;

        if let Some(ref filename) = self.filename {
            if !filename.is_empty() {
                validate_extension(filename)
                    .map_err(|e| ApiError::validation("filename", e.to_string()))?;
            }
        }

        Ok(image)
    }
}

/// Reject thresholds outside `[0, 1]`
pub fn validate_confidence(confidence: Option<f32>) -> Result<(), ApiError> {
    match confidence {
        Some(c) if !(0.0..=1.0).contains(&c) => Err(ApiError::validation(
            "confidence",
            format!("confidence must be between 0 and 1, got {}", c),
        )),
        _ => Ok(()),
    }
}

/// Check an uploaded file name: present, non-empty, allowed extension
pub fn validate_upload_filename(filename: Option<&str>) -> Result<String, ApiError> {
    let filename = filename.unwrap_or_default().trim();
    if filename.is_empty() {
        return Err(ApiError::validation("image", "No file selected"));
    }
    validate_extension(filename).map_err(|e| ApiError::validation("image", e.to_string()))?;
    Ok(filename.to_string())
}
