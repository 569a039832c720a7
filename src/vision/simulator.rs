// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Seeded stand-in detector used when no model artifact could be loaded
//!
//! The simulator is NOT a classifier. It scans the uploaded filename for a few
//! keywords and lays out plausible boxes from the image size, so clients keep
//! receiving schema-valid responses in demo deployments. The same
//! (filename, width, height) always yields the same detections.

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use super::detection::{DetectionInput, DetectorMode, ModelInfo, RawDetection, BASKETBALL_CLASSES};
use super::detector::{Detector, DetectorError, DetectorOutput};

pub const DEMO_MODEL_TYPE: &str = "Demo Simulator";

const BALL_CONFIDENCE: RangeInclusive<f32> = 0.85..=0.95;
const PERSON_CONFIDENCE: RangeInclusive<f32> = 0.75..=0.92;
const COURT_CONFIDENCE: RangeInclusive<f32> = 0.80..=0.95;
const RIM_CONFIDENCE: RangeInclusive<f32> = 0.70..=0.88;

/// Reported processing overhead, in seconds
const LATENCY_JITTER: RangeInclusive<f64> = 0.05..=0.25;

/// Court box inset from every image edge, in pixels
const COURT_INSET: u32 = 10;

const CLASS_COURT: u32 = 0;
const CLASS_BALL: u32 = 1;
const CLASS_PERSON: u32 = 3;
const CLASS_RIM: u32 = 4;

/// Filename keywords and the synthetic classes they trigger
pub const KEYWORD_RULES: &[(&str, &[&str])] = &[
    ("ball", &["ball"]),
    ("basketball", &["ball"]),
    ("court", &["Basketball-court", "rim"]),
    ("game", &["Basketball-court", "rim"]),
    ("player", &["person"]),
    ("person", &["person"]),
];

/// Fixed description of the synthetic taxonomy, exposed by the health query
#[derive(Debug, Clone, Serialize)]
pub struct DemoTaxonomy {
    pub description: &'static str,
    pub classes: Vec<&'static str>,
    pub keywords: Vec<KeywordRule>,
    pub default_class: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeywordRule {
    pub keyword: &'static str,
    pub emits: Vec<&'static str>,
}

pub fn demo_taxonomy() -> DemoTaxonomy {
    DemoTaxonomy {
        description: "Simulated detections derived from filename keywords and image size; no pixel analysis",
        classes: BASKETBALL_CLASSES.to_vec(),
        keywords: KEYWORD_RULES
            .iter()
            .map(|&(keyword, emits)| KeywordRule {
                keyword,
                emits: emits.to_vec(),
            })
            .collect(),
        default_class: "ball",
    }
}

/// Seed derived from the request: filename byte length plus image dimensions
pub fn simulation_seed(filename: &str, width: u32, height: u32) -> u64 {
    filename.len() as u64 + width as u64 + height as u64
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedDetector {
    load_error: Option<String>,
}

impl SimulatedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Demo detector that remembers why the real model is missing
    pub fn with_load_error(load_error: Option<String>) -> Self {
        Self { load_error }
    }

    /// Generate detections for a filename and image size, before any threshold
    pub fn simulate(&self, filename: &str, width: u32, height: u32) -> DetectorOutput {
        // Request-local generator keeps concurrent requests independent
        let mut rng = StdRng::seed_from_u64(simulation_seed(filename, width, height));
        let name = filename.to_lowercase();
        let (w, h) = (width as f32, height as f32);

        let wants_ball = name.contains("ball");
        let wants_court = name.contains("court") || name.contains("game");
        let wants_person = name.contains("player") || name.contains("person");

        let mut detections = Vec::new();

        if wants_ball || !(wants_court || wants_person) {
            detections.push(ball(&mut rng, w, h));
        }

        if wants_court {
            detections.push(court(&mut rng, width, height));
            if rng.gen_bool(0.5) {
                detections.push(rim(&mut rng, w, h));
            }
        }

        if wants_person {
            let players: u32 = rng.gen_range(1..=2);
            for slot in 0..players {
                detections.push(person(&mut rng, w, h, slot));
            }
        }

        let jitter = rng.gen_range(LATENCY_JITTER);

        debug!(
            "Simulated {} detections for '{}' ({}x{})",
            detections.len(),
            filename,
            width,
            height
        );

        DetectorOutput {
            detections,
            latency_jitter: Duration::from_secs_f64(jitter),
        }
    }
}

impl Detector for SimulatedDetector {
    fn detect(
        &self,
        input: &DetectionInput,
        confidence_threshold: f32,
    ) -> Result<DetectorOutput, DetectorError> {
        let mut output = self.simulate(&input.filename, input.width(), input.height());
        output
            .detections
            .retain(|det| det.confidence >= confidence_threshold);
        Ok(output)
    }

    fn is_available(&self) -> bool {
        true
    }

    fn describe(&self) -> ModelInfo {
        ModelInfo {
            loaded: false,
            model_type: Some(DEMO_MODEL_TYPE.to_string()),
            classes: BASKETBALL_CLASSES.iter().map(|c| c.to_string()).collect(),
            load_time: None,
            error: self.load_error.clone(),
        }
    }

    fn mode(&self) -> DetectorMode {
        DetectorMode::Demo
    }
}

fn class_name(class_id: u32) -> &'static str {
    BASKETBALL_CLASSES[class_id as usize]
}

fn ball(rng: &mut StdRng, w: f32, h: f32) -> RawDetection {
    let bbox = [
        w * (0.20 + rng.gen_range(0.0..0.05)),
        h * (0.20 + rng.gen_range(0.0..0.05)),
        w * (0.80 - rng.gen_range(0.0..0.05)),
        h * (0.80 - rng.gen_range(0.0..0.05)),
    ];
    RawDetection::new(bbox, CLASS_BALL, class_name(CLASS_BALL), rng.gen_range(BALL_CONFIDENCE))
}

fn court(rng: &mut StdRng, width: u32, height: u32) -> RawDetection {
    // Exactly [10, 10, w-10, h-10]; smaller insets on images under 20px
    let inset_x = COURT_INSET.min(width / 2);
    let inset_y = COURT_INSET.min(height / 2);
    let bbox = [
        inset_x as f32,
        inset_y as f32,
        (width - inset_x) as f32,
        (height - inset_y) as f32,
    ];
    RawDetection::new(bbox, CLASS_COURT, class_name(CLASS_COURT), rng.gen_range(COURT_CONFIDENCE))
}

fn rim(rng: &mut StdRng, w: f32, h: f32) -> RawDetection {
    let x1 = w * rng.gen_range(0.40..0.45);
    let y1 = h * rng.gen_range(0.10..0.15);
    let bbox = [x1, y1, x1 + w * 0.15, y1 + h * 0.10];
    RawDetection::new(bbox, CLASS_RIM, class_name(CLASS_RIM), rng.gen_range(RIM_CONFIDENCE))
}

fn person(rng: &mut StdRng, w: f32, h: f32, slot: u32) -> RawDetection {
    // Two side-by-side lanes so a second player never overlaps the first
    let x1 = w * (0.05 + 0.45 * slot as f32 + rng.gen_range(0.0..0.10));
    let y1 = h * rng.gen_range(0.15..0.25);
    let bbox = [x1, y1, x1 + w * 0.30, h * rng.gen_range(0.85..0.95)];
    RawDetection::new(bbox, CLASS_PERSON, class_name(CLASS_PERSON), rng.gen_range(PERSON_CONFIDENCE))
}
