// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use dds70_detector::{
    api::ApiServer,
    config::ServerArgs,
    vision::{DetectorMode, DetectorService},
};
use std::{env, sync::Arc};
use tokio::signal;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = ServerArgs::parse();
    args.detector.validate()?;

    println!("🏀 Basketball Detection API");
    println!("📦 BUILD VERSION: {}", dds70_detector::version::VERSION);
    println!("📅 Build Date: {}", dds70_detector::version::BUILD_DATE);
    println!();

    let detector_config = args.detector_config();
    let api_config = args.api_config();

    println!("🧠 Loading detection model...");
    let service = DetectorService::load(&detector_config).await;

    match service.mode() {
        DetectorMode::Real => {
            let info = service.model_info();
            println!(
                "✅ {} loaded ({} classes)",
                info.model_type.as_deref().unwrap_or("model"),
                info.classes.len()
            );
        }
        DetectorMode::Demo => {
            println!("🎭 DEMO MODE: detections are simulated from filenames and image size");
        }
        DetectorMode::Unavailable => {
            if detector_config.exit_on_load_failure {
                error!(
                    "No model could be loaded: {}",
                    service.model_info().error.as_deref().unwrap_or("unknown error")
                );
                std::process::exit(1);
            }
            println!("⚠️  No model loaded: detection endpoints will answer 503");
        }
    }

    if detector_config.exit_on_load_failure && service.mode() == DetectorMode::Demo {
        error!("No model could be loaded and EXIT_ON_LOAD_FAILURE is set");
        std::process::exit(1);
    }

    let server = ApiServer::new(api_config.clone(), Arc::new(service)).await?;

    let separator = "=".repeat(60);
    println!("\n{}", separator);
    println!("🌐 API: http://{}", server.local_addr());
    println!("   POST /api/detect          (multipart field 'image')");
    println!("   POST /api/detect-base64   (JSON {{\"image\": \"...\"}})");
    println!("   GET  /api/health | /api/model-info | /api/classes");
    println!("   CORS origins: {}", api_config.cors_allowed_origins.join(", "));
    println!("\nPress Ctrl+C to shutdown...");
    println!("{}\n", separator);

    // Wait for shutdown signal
    signal::ctrl_c().await?;

    println!("\n⏹️  Shutting down...");
    server.shutdown().await;

    println!("👋 Goodbye!");
    Ok(())
}
