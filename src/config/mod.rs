// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Command line and environment configuration
//!
//! Every option can be given as a flag or through the environment (a `.env`
//! file is loaded by the binaries before parsing).

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser};

use crate::api::ApiConfig;
use crate::vision::image_utils::MAX_IMAGE_SIZE;
use crate::vision::service::DEFAULT_CONFIDENCE;
use crate::vision::yolo::{DEFAULT_IOU_THRESHOLD, YOLO_INPUT_SIZE};
use crate::vision::DetectorConfig;

/// Model selection and inference options shared by the server and the CLI
#[derive(Args, Debug, Clone)]
pub struct DetectorArgs {
    /// Fine-tuned basketball model (ONNX)
    #[arg(long, env = "MODEL_PATH", default_value = "trainon10kdataset/weights/best.onnx")]
    pub model_path: PathBuf,

    /// Pre-trained model tried when the custom one fails to load
    #[arg(long, env = "FALLBACK_MODEL_PATH", default_value = "yolov8n.onnx")]
    pub fallback_model_path: Option<PathBuf>,

    /// TOML file with `classes = [...]`, used when the model carries no names
    #[arg(long, env = "LABELS_PATH")]
    pub labels_path: Option<PathBuf>,

    /// Serve simulated detections when no model loads
    #[arg(long, env = "DEMO_FALLBACK", default_value_t = true, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub demo_fallback: bool,

    /// Default confidence threshold (0.0-1.0)
    #[arg(long, env = "DEFAULT_CONFIDENCE", default_value_t = DEFAULT_CONFIDENCE)]
    pub default_confidence: f32,

    /// IoU threshold for non-maximum suppression
    #[arg(long, env = "IOU_THRESHOLD", default_value_t = DEFAULT_IOU_THRESHOLD)]
    pub iou_threshold: f32,

    /// Square model input size in pixels
    #[arg(long, env = "MODEL_INPUT_SIZE", default_value_t = YOLO_INPUT_SIZE)]
    pub input_size: u32,

    /// Largest accepted image, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = MAX_IMAGE_SIZE)]
    pub max_upload_bytes: usize,

    /// Sort detections by confidence, highest first
    #[arg(long, env = "SORT_BY_CONFIDENCE", default_value_t = true, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub sort_by_confidence: bool,
}

impl DetectorArgs {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_confidence) {
            bail!(
                "DEFAULT_CONFIDENCE must be between 0 and 1, got {}",
                self.default_confidence
            );
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            bail!("IOU_THRESHOLD must be between 0 and 1, got {}", self.iou_threshold);
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            bail!("MODEL_INPUT_SIZE must be a positive multiple of 32, got {}", self.input_size);
        }
        Ok(())
    }

    pub fn detector_config(&self, exit_on_load_failure: bool) -> DetectorConfig {
        DetectorConfig {
            model_path: self.model_path.clone(),
            fallback_model_path: self
                .fallback_model_path
                .clone()
                .filter(|p| !p.as_os_str().is_empty()),
            labels_path: self.labels_path.clone(),
            demo_fallback: self.demo_fallback,
            exit_on_load_failure,
            input_size: self.input_size,
            iou_threshold: self.iou_threshold,
            default_confidence: self.default_confidence,
            max_upload_bytes: self.max_upload_bytes,
            sort_by_confidence: self.sort_by_confidence,
        }
    }
}

/// Basketball object detection HTTP service
#[derive(Parser, Debug, Clone)]
#[command(name = "dds70-detector")]
#[command(version)]
#[command(about = "Basketball object detection API", long_about = None)]
pub struct ServerArgs {
    /// Interface to bind
    #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "API_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Comma-separated allowed origins, or `*` for any
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Exit instead of degrading when no model loads
    #[arg(long, env = "EXIT_ON_LOAD_FAILURE", default_value_t = false, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub exit_on_load_failure: bool,

    #[command(flatten)]
    pub detector: DetectorArgs,
}

impl ServerArgs {
    pub fn api_config(&self) -> ApiConfig {
        let defaults = ApiConfig::default();
        let cors_allowed_origins: Vec<String> = self
            .cors_origins
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        ApiConfig {
            listen_addr: format!("{}:{}", self.host, self.port),
            cors_allowed_origins: if cors_allowed_origins.is_empty() {
                defaults.cors_allowed_origins
            } else {
                cors_allowed_origins
            },
            max_upload_bytes: self.detector.max_upload_bytes,
        }
    }

    pub fn detector_config(&self) -> DetectorConfig {
        self.detector.detector_config(self.exit_on_load_failure)
    }
}
