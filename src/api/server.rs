// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::detect::{detect_base64_handler, detect_handler, legacy_detect_handler};
use super::info::{
    classes_handler, health_handler, legacy_health_handler, legacy_model_info_handler,
    model_info_handler, not_found_handler,
};
use crate::vision::image_utils::MAX_IMAGE_SIZE;
use crate::vision::DetectorService;

/// Endpoints listed in 404 responses
pub const AVAILABLE_ENDPOINTS: &[&str] = &[
    "/api/health",
    "/api/detect",
    "/api/detect-base64",
    "/api/model-info",
    "/api/classes",
];

/// Headroom over the image limit for multipart framing and base64 inflation
const BODY_LIMIT_OVERHEAD: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub listen_addr: String,
    /// Allowed CORS origins; `*` allows any origin
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            cors_allowed_origins: vec![
                "https://pyoo.dev".to_string(),
                "https://www.pyoo.dev".to_string(),
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
            max_upload_bytes: MAX_IMAGE_SIZE,
        }
    }
}

impl ApiConfig {
    fn body_limit(&self) -> usize {
        // base64 bodies are 4/3 of the decoded size
        self.max_upload_bytes / 3 * 4 + BODY_LIMIT_OVERHEAD
    }

    fn cors_layer(&self) -> CorsLayer {
        if self.cors_allowed_origins.iter().any(|o| o == "*") {
            return CorsLayer::permissive();
        }

        let origins: Vec<HeaderValue> = self
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    }
}

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<DetectorService>,
}

impl AppState {
    pub fn new(detector: Arc<DetectorService>) -> Self {
        Self { detector }
    }
}

/// Build the router with all detection and status routes
pub fn create_app(state: AppState, config: &ApiConfig) -> Router {
    Router::new()
        .route("/api/detect", post(detect_handler))
        .route("/api/detect-base64", post(detect_base64_handler))
        .route("/api/health", get(health_handler))
        .route("/api/model-info", get(model_info_handler))
        .route("/api/classes", get(classes_handler))
        // Legacy routes used by the embeddable widget
        .route("/detect", post(legacy_detect_handler))
        .route("/health", get(legacy_health_handler))
        .route("/model-info", get(legacy_model_info_handler))
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(config.body_limit()))
        .layer(config.cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Running HTTP server
pub struct ApiServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    /// Bind the listener and start serving in the background
    pub async fn new(config: ApiConfig, detector: Arc<DetectorService>) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
        let addr = listener.local_addr()?;

        let app = create_app(AppState::new(detector), &config);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let serve_future = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });

            if let Err(e) = serve_future.await {
                warn!("HTTP server stopped with error: {}", e);
            }
        });

        info!("🏀 Detection API listening on http://{}", addr);

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("HTTP server stopped");
    }
}
