// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod version;
pub mod vision;

// Re-export main types
pub use api::{create_app, ApiConfig, ApiServer, AppState};
pub use config::{DetectorArgs, ServerArgs};
pub use vision::{
    DetectionReport, DetectionResult, Detector, DetectorConfig, DetectorMode, DetectorService,
    ModelInfo, NormalizedDetection, RawDetection,
};
