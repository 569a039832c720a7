// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLO (v8-style ONNX export) object detector
//!
//! Runs on CPU through ONNX Runtime. Expects a single `[1, 3, H, W]` input and
//! a `[1, 4 + classes, anchors]` (or transposed) output of
//! `cx, cy, w, h, class scores...` rows.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage};
use ndarray::{Array3, ArrayViewD, Axis};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::detection::{DetectionInput, DetectorMode, ModelInfo, RawDetection, BASKETBALL_CLASSES};
use super::detector::{Detector, DetectorError, DetectorOutput};

/// Default square input size for YOLOv8 exports
pub const YOLO_INPUT_SIZE: u32 = 640;

/// Default IoU above which overlapping boxes of one class are suppressed
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// Letterbox padding value (114/255, as used in training)
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Upper bound on boxes kept after NMS
const MAX_DETECTIONS: usize = 300;

/// COCO class names in YOLOv8 output order
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Settings for loading one ONNX model
#[derive(Debug, Clone)]
pub struct YoloConfig {
    pub model_path: PathBuf,
    /// Label shown to clients, e.g. "Custom Basketball Model"
    pub model_type: String,
    /// Optional TOML file with `classes = [...]`
    pub labels_path: Option<PathBuf>,
    pub input_size: u32,
    pub iou_threshold: f32,
}

impl YoloConfig {
    pub fn new(model_path: impl Into<PathBuf>, model_type: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            model_type: model_type.into(),
            labels_path: None,
            input_size: YOLO_INPUT_SIZE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LabelsFile {
    classes: Vec<String>,
}

/// Scale and padding applied while letterboxing, needed to map boxes back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Map a model-space `cx, cy, w, h` box to source image corners
    pub fn to_source(&self, cx: f32, cy: f32, w: f32, h: f32) -> [f32; 4] {
        [
            (cx - w / 2.0 - self.pad_x) / self.scale,
            (cy - h / 2.0 - self.pad_y) / self.scale,
            (cx + w / 2.0 - self.pad_x) / self.scale,
            (cy + h / 2.0 - self.pad_y) / self.scale,
        ]
    }
}

/// YOLO detector backed by an ONNX Runtime session
#[derive(Clone)]
pub struct YoloDetector {
    session: Arc<Mutex<Session>>,
    input_name: String,
    input_size: u32,
    iou_threshold: f32,
    classes: Vec<String>,
    model_type: String,
    load_time: f64,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("input_name", &self.input_name)
            .field("input_size", &self.input_size)
            .field("classes", &self.classes.len())
            .field("model_type", &self.model_type)
            .finish_non_exhaustive()
    }
}

impl YoloDetector {
    /// Load a YOLO ONNX model
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    /// - The labels file is given but unreadable
    pub async fn new(config: &YoloConfig) -> Result<Self> {
        let started = Instant::now();
        let model_path = config.model_path.as_path();

        if !model_path.exists() {
            anyhow::bail!("YOLO model not found: {}", model_path.display());
        }

        info!("Loading YOLO model from {}", model_path.display());

        let mut session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!("Failed to load YOLO model from {}", model_path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        if let Some(input) = session.inputs.first() {
            debug!("YOLO model input type: {:?}", input.input_type);
        }

        let num_classes = warm_up_class_count(&mut session, &input_name, config.input_size)?;
        let metadata_names = embedded_class_names(&session);
        let classes = resolve_classes(metadata_names, config.labels_path.as_deref(), num_classes)?;

        let load_time = started.elapsed().as_secs_f64();
        info!(
            "✅ YOLO model loaded: {} ({} classes, {:.2}s)",
            config.model_type,
            classes.len(),
            load_time
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            input_size: config.input_size,
            iou_threshold: config.iou_threshold,
            classes,
            model_type: config.model_type.clone(),
            load_time,
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    fn run(&self, image: &DynamicImage, confidence_threshold: f32) -> Result<Vec<RawDetection>> {
        let (tensor, letterbox) = letterbox(image, self.input_size, self.input_size);
        let input_value = Value::from_array(tensor.insert_axis(Axis(0)))
            .context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("YOLO session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("YOLO inference failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let candidates = decode_predictions(
            output.view(),
            &self.classes,
            confidence_threshold,
            letterbox,
        )?;
        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

impl Detector for YoloDetector {
    fn detect(
        &self,
        input: &DetectionInput,
        confidence_threshold: f32,
    ) -> Result<DetectorOutput, DetectorError> {
        let detections = self.run(&input.image, confidence_threshold)?;
        Ok(DetectorOutput::new(detections))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn describe(&self) -> ModelInfo {
        ModelInfo {
            loaded: true,
            model_type: Some(self.model_type.clone()),
            classes: self.classes.clone(),
            load_time: Some(self.load_time),
            error: None,
        }
    }

    fn mode(&self) -> DetectorMode {
        DetectorMode::Real
    }
}

/// Aspect-preserving resize into a `target_w x target_h` canvas, CHW in [0, 1]
pub fn letterbox(image: &DynamicImage, target_w: u32, target_h: u32) -> (Array3<f32>, Letterbox) {
    let (orig_w, orig_h) = (image.width().max(1), image.height().max(1));
    let scale = (target_w as f32 / orig_w as f32).min(target_h as f32 / orig_h as f32);

    let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, target_w);
    let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, target_h);

    let rgb = image
        .resize_exact(new_w, new_h, FilterType::Triangle)
        .to_rgb8();

    let pad_x = (target_w - new_w) / 2;
    let pad_y = (target_h - new_h) / 2;

    let mut canvas = Array3::<f32>::from_elem((3, target_h as usize, target_w as usize), PAD_VALUE);
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (cx, cy) = ((x + pad_x) as usize, (y + pad_y) as usize);
        for c in 0..3 {
            canvas[[c, cy, cx]] = pixel[c] as f32 / 255.0;
        }
    }

    (
        canvas,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

/// Turn the raw output tensor into thresholded candidates in source pixels
pub fn decode_predictions(
    output: ArrayViewD<f32>,
    classes: &[String],
    confidence_threshold: f32,
    letterbox: Letterbox,
) -> Result<Vec<RawDetection>> {
    let shape = output.shape();
    let num_classes = class_count(shape)?;

    // [1, features, anchors] is the usual export; [1, anchors, features] also occurs
    let features_first = shape[1] <= shape[2];
    let rows = output
        .index_axis(Axis(0), 0)
        .into_dimensionality::<ndarray::Ix2>()
        .context("YOLO output is not two-dimensional per batch")?;
    let rows = if features_first { rows.reversed_axes() } else { rows };

    let fallback;
    let names: &[String] = if classes.len() == num_classes {
        classes
    } else {
        warn!(
            "Model outputs {} classes but {} labels are known",
            num_classes,
            classes.len()
        );
        fallback = fallback_classes(num_classes);
        &fallback
    };
    let label = |class_id: usize| -> String {
        names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    };

    let mut candidates = Vec::new();
    for row in rows.outer_iter() {
        let (class_id, score) = row
            .iter()
            .skip(4)
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |best, (idx, &score)| {
                if score > best.1 {
                    (idx, score)
                } else {
                    best
                }
            });

        if !score.is_finite() || score < confidence_threshold {
            continue;
        }

        let bbox = letterbox.to_source(row[0], row[1], row[2], row[3]);
        candidates.push(RawDetection::new(bbox, class_id as u32, label(class_id), score));
    }

    Ok(candidates)
}

/// Class-aware non-maximum suppression, highest confidence first
pub fn non_max_suppression(mut candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in candidates {
        if kept.len() >= MAX_DETECTIONS {
            break;
        }
        let overlaps = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union > f32::EPSILON {
        inter / union
    } else {
        0.0
    }
}

/// Class count of a `[1, 4 + classes, anchors]` or `[1, anchors, 4 + classes]` output
pub fn class_count(shape: &[usize]) -> Result<usize> {
    if shape.len() != 3 || shape[0] != 1 {
        anyhow::bail!("Unexpected YOLO output shape: {:?}", shape);
    }
    let num_features = shape[1].min(shape[2]);
    if num_features < 5 {
        anyhow::bail!("YOLO output has too few features: {}", num_features);
    }
    Ok(num_features - 4)
}

/// Run one blank frame and read the class count off the output tensor
fn warm_up_class_count(session: &mut Session, input_name: &str, input_size: u32) -> Result<usize> {
    let size = input_size as usize;
    let blank = ndarray::Array4::<f32>::from_elem((1, 3, size, size), PAD_VALUE);
    let input_value = Value::from_array(blank).context("Failed to create warm-up tensor")?;

    let outputs = session
        .run(ort::inputs![input_name => input_value])
        .context("YOLO warm-up inference failed")?;
    let output = outputs[0]
        .try_extract_array::<f32>()
        .context("Failed to extract warm-up output")?;

    let num_classes = class_count(output.shape())?;
    debug!("YOLO output shape {:?} ({} classes)", output.shape(), num_classes);
    Ok(num_classes)
}

fn embedded_class_names(session: &Session) -> Option<String> {
    let metadata = session.metadata().ok()?;
    metadata.custom("names").ok().flatten()
}

/// Parse the `names` metadata written by ultralytics: `{0: 'person', 1: 'bicycle'}`
pub fn parse_names_metadata(raw: &str) -> Vec<String> {
    let Ok(pattern) = Regex::new(r#"(\d+)\s*:\s*['"]([^'"]*)['"]"#) else {
        return Vec::new();
    };
    let by_id: BTreeMap<usize, String> = pattern
        .captures_iter(raw)
        .filter_map(|cap| Some((cap[1].parse().ok()?, cap[2].to_string())))
        .collect();
    by_id.into_values().collect()
}

/// Class labels: embedded metadata, then labels file, then the taxonomy for the output width
///
/// A label list is only used when its length matches the model's class count.
fn resolve_classes(
    metadata_names: Option<String>,
    labels_path: Option<&Path>,
    num_classes: usize,
) -> Result<Vec<String>> {
    if let Some(raw) = metadata_names {
        let names = parse_names_metadata(&raw);
        if names.len() == num_classes {
            return Ok(names);
        }
        warn!(
            "Model metadata 'names' gives {} labels for {} classes: {}",
            names.len(),
            num_classes,
            raw
        );
    }

    if let Some(path) = labels_path {
        let labels = load_labels_file(path)?;
        if labels.len() == num_classes {
            return Ok(labels);
        }
        warn!(
            "Labels file {} gives {} labels for {} classes",
            path.display(),
            labels.len(),
            num_classes
        );
    }

    Ok(fallback_classes(num_classes))
}

/// Known taxonomy for `num_classes`, or `class_<id>` placeholders
pub fn fallback_classes(num_classes: usize) -> Vec<String> {
    match known_taxonomy(num_classes) {
        Some(names) => names.iter().map(|n| n.to_string()).collect(),
        None => (0..num_classes).map(|id| format!("class_{}", id)).collect(),
    }
}

/// Read a labels TOML file (`classes = ["ball", ...]`)
pub fn load_labels_file(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read labels file {}", path.display()))?;
    let labels: LabelsFile = toml::from_str(&text)
        .with_context(|| format!("Invalid labels file {}", path.display()))?;
    Ok(labels.classes)
}

/// Built-in label set for a known output width, if any
pub fn known_taxonomy(num_classes: usize) -> Option<&'static [&'static str]> {
    match num_classes {
        n if n == BASKETBALL_CLASSES.len() => Some(BASKETBALL_CLASSES),
        n if n == COCO_CLASSES.len() => Some(COCO_CLASSES),
        _ => None,
    }
}
