// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection API endpoint module
//!
//! Provides POST /api/detect, POST /api/detect-base64 and the legacy POST /detect.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{detect_base64_handler, detect_handler, legacy_detect_handler};
pub use request::{Base64DetectRequest, DetectQuery};
pub use response::render_detection;
