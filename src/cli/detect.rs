// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::DetectorArgs;
use crate::vision::image_utils::validate_extension;
use crate::vision::legacy::{to_flat, to_tuples};
use crate::vision::{DetectionReport, DetectionResult, DetectorService, LegacyFormat};

/// Arguments for the detect command
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Image files to run detection on
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Confidence threshold (0.0-1.0); DEFAULT_CONFIDENCE when omitted
    #[arg(long)]
    pub confidence: Option<f32>,

    /// Output format: canonical, tuples or flat
    #[arg(long, default_value = "canonical")]
    pub format: String,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    #[command(flatten)]
    pub detector: DetectorArgs,
}

/// Arguments for the info command
#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub detector: DetectorArgs,
}

/// Run detection on each file and print one JSON document per file
pub async fn run_detect(args: DetectArgs) -> Result<()> {
    dotenv::dotenv().ok();
    args.detector.validate()?;

    let format: LegacyFormat = args.format.parse().map_err(|e: String| anyhow!(e))?;
    if let Some(c) = args.confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(anyhow!("--confidence must be between 0 and 1, got {}", c));
        }
    }

    let service = DetectorService::load(&args.detector.detector_config(false)).await;
    if !service.is_available() {
        return Err(anyhow!(
            "Model not loaded: {}",
            service.model_info().error.as_deref().unwrap_or("unknown error")
        ));
    }
    info!("Running in {} mode", service.mode());

    let confidence = service.resolve_confidence(args.confidence);
    for path in &args.images {
        let result = detect_file(&service, path, confidence).await?;
        let output = render_json(result, format);
        let text = if args.pretty {
            serde_json::to_string_pretty(&output)?
        } else {
            serde_json::to_string(&output)?
        };
        println!("{}", text);
    }

    Ok(())
}

/// Print the model description the server would expose
pub async fn show_info(args: InfoArgs) -> Result<()> {
    dotenv::dotenv().ok();
    args.detector.validate()?;

    let service = DetectorService::load(&args.detector.detector_config(false)).await;
    let output = json!({
        "mode": service.mode(),
        "model": service.model_info(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn detect_file(service: &DetectorService, path: &Path, confidence: f32) -> Result<DetectionResult> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid file name: {}", path.display()))?
        .to_string();
    validate_extension(&filename)?;

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let result = service
        .detect_bytes(bytes, filename, confidence)
        .await
        .with_context(|| format!("Detection failed for {}", path.display()))?;

    if let Some(ref error) = result.error {
        return Err(anyhow!("{}: {}", path.display(), error));
    }
    Ok(result)
}

/// JSON document for one result in the requested format
pub fn render_json(result: DetectionResult, format: LegacyFormat) -> Value {
    match format {
        LegacyFormat::Canonical => json!(DetectionReport::from_result(result)),
        LegacyFormat::Tuples => to_tuples(&result.detections),
        LegacyFormat::Flat => json!(to_flat(&result.detections)),
    }
}
