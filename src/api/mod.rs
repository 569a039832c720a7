// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod detect;
pub mod errors;
pub mod info;
pub mod server;

pub use detect::{detect_base64_handler, detect_handler, Base64DetectRequest, DetectQuery};
pub use errors::{ApiError, ErrorResponse};
pub use server::{create_app, ApiConfig, ApiServer, AppState};
