// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Result normalizer tests
//!
//! Properties checked over generated inputs:
//! - Output count = input count minus dropped invalid boxes
//! - Confidences stay in [0, 1] with two decimals
//! - width/height are non-negative and match the corners after clamping

use dds70_detector::vision::{Normalizer, RawDetection};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_detection(rng: &mut StdRng, width: u32, height: u32) -> RawDetection {
    let (w, h) = (width as f32, height as f32);
    let x1 = rng.gen_range(-0.2 * w..1.2 * w);
    let y1 = rng.gen_range(-0.2 * h..1.2 * h);
    RawDetection::new(
        [x1, y1, x1 + rng.gen_range(0.0..w), y1 + rng.gen_range(0.0..h)],
        rng.gen_range(0..6),
        "ball",
        rng.gen_range(-0.1..1.1),
    )
}

#[cfg(test)]
mod normalizer_tests {
    use super::*;

    #[test]
    fn test_valid_boxes_are_all_kept_and_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        let normalizer = Normalizer::default();

        for _ in 0..200 {
            let (width, height) = (rng.gen_range(1..2000), rng.gen_range(1..2000));
            let count = rng.gen_range(0..20);
            let raw: Vec<RawDetection> = (0..count)
                .map(|_| random_detection(&mut rng, width, height))
                .collect();

            let out = normalizer.normalize(&raw, width, height);
            assert_eq!(out.len(), raw.len());

            for det in &out {
                assert!((0.0..=1.0).contains(&det.confidence));
                let hundredths = det.confidence * 100.0;
                assert!((hundredths - hundredths.round()).abs() < 1e-3);

                let b = det.bbox;
                assert!(b.x2 <= width && b.y2 <= height);
                assert_eq!(b.width, b.x2 - b.x1);
                assert_eq!(b.height, b.y2 - b.y1);
                assert_eq!(det.area, b.width as u64 * b.height as u64);
            }

            for pair in out.windows(2) {
                assert!(pair[0].confidence >= pair[1].confidence);
            }
        }
    }

    #[test]
    fn test_invalid_boxes_reduce_count() {
        let raw = vec![
            RawDetection::new([0.0, 0.0, 10.0, 10.0], 1, "ball", 0.5),
            RawDetection::new([30.0, 0.0, 10.0, 10.0], 1, "ball", 0.5),
            RawDetection::new([0.0, f32::INFINITY, 10.0, 10.0], 1, "ball", 0.5),
            RawDetection::new([0.0, 0.0, 10.0, 10.0], 1, "ball", f32::NAN),
        ];
        assert_eq!(Normalizer::default().normalize(&raw, 100, 100).len(), 1);
    }

    #[test]
    fn test_sort_scenario() {
        let raw: Vec<RawDetection> = [0.3, 0.9, 0.6]
            .iter()
            .map(|&c| RawDetection::new([0.0, 0.0, 5.0, 5.0], 1, "ball", c))
            .collect();
        let confidences: Vec<f64> = Normalizer::default()
            .normalize(&raw, 10, 10)
            .iter()
            .map(|d| d.confidence)
            .collect();
        assert_eq!(confidences, vec![0.9, 0.6, 0.3]);
    }

    #[test]
    fn test_fully_outside_box_collapses_to_edge() {
        let raw = vec![RawDetection::new([700.0, 500.0, 800.0, 600.0], 0, "rim", 0.8)];
        let out = Normalizer::default().normalize(&raw, 640, 480);
        assert_eq!(out[0].bbox.corners(), [640, 480, 640, 480]);
        assert_eq!(out[0].area, 0);
    }
}
