// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service status endpoints: health, model info, classes

pub mod handler;

pub use handler::{
    classes_handler, health_handler, legacy_health_handler, legacy_model_info_handler,
    model_info_handler, not_found_handler,
};
