mod anchors;

use std::{cmp::Ordering, f32::consts::FRAC_PI_2, path::Path};

use anchors::{NUM_ANCHORS, generate_anchors};
use anyhow::{Context, Result, anyhow, ensure};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::common::{Letterbox, PALM_INPUT_SIZE, letterbox_frame};
use crate::types::{Frame, PalmRegion};

const PALM_KEYPOINTS: usize = 7;
const BOX_FEATURES: usize = 4 + PALM_KEYPOINTS * 2;
// Crop generously so fingertips stay inside the landmark model's input.
const CROP_EXPANSION: f32 = 2.4;
const MIN_CROP_SIDE: f32 = 80.0;

#[derive(Clone, Debug)]
pub struct PalmDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: 0.3,
            top_k: 32,
        }
    }
}

pub struct PalmDetector {
    session: Session,
    anchors: Vec<[f32; 2]>,
    cfg: PalmDetectorConfig,
}

impl PalmDetector {
    pub fn new(model_path: &Path, cfg: PalmDetectorConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load palm detector from {}", model_path.display())
            })?;

        Ok(Self {
            session,
            anchors: generate_anchors(),
            cfg,
        })
    }

    /// Palm regions in frame pixels, best score first.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, letterbox) = letterbox_frame(frame, PALM_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run palm detector session")?;

        ensure!(
            outputs.len() >= 2,
            "palm detector returned {} outputs, expected at least 2",
            outputs.len()
        );

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let boxes = boxes
            .as_slice()
            .ok_or_else(|| anyhow!("palm boxes not contiguous"))?;
        let scores = scores
            .as_slice()
            .ok_or_else(|| anyhow!("palm scores not contiguous"))?;

        decode_palms(boxes, scores, &self.anchors, &letterbox, &self.cfg)
    }
}

fn decode_palms(
    boxes: &[f32],
    scores: &[f32],
    anchors: &[[f32; 2]],
    letterbox: &Letterbox,
    cfg: &PalmDetectorConfig,
) -> Result<Vec<PalmRegion>> {
    let count = anchors.len().min(NUM_ANCHORS);
    ensure!(
        boxes.len() >= count * BOX_FEATURES && scores.len() >= count,
        "palm outputs too small: {} box values and {} scores for {count} anchors",
        boxes.len(),
        scores.len()
    );

    let input = PALM_INPUT_SIZE as f32;
    // Normalised input coordinates back to frame pixels.
    let long_side = letterbox.orig_w.max(letterbox.orig_h) as f32;
    let bias_x = letterbox.pad_x / letterbox.scale;
    let bias_y = letterbox.pad_y / letterbox.scale;
    let to_frame = |nx: f32, ny: f32| (nx * long_side - bias_x, ny * long_side - bias_y);

    let mut candidates = Vec::new();
    for (idx, anchor) in anchors.iter().take(count).enumerate() {
        let score = sigmoid(scores[idx]);
        if score < cfg.score_threshold {
            continue;
        }

        let raw = &boxes[idx * BOX_FEATURES..(idx + 1) * BOX_FEATURES];
        let cx = raw[0] / input + anchor[0];
        let cy = raw[1] / input + anchor[1];
        let (hw, hh) = (raw[2] / input / 2.0, raw[3] / input / 2.0);
        if hw <= 0.0 || hh <= 0.0 {
            continue;
        }

        let (x1, y1) = to_frame(cx - hw, cy - hh);
        let (x2, y2) = to_frame(cx + hw, cy + hh);
        let landmarks = raw[4..]
            .chunks_exact(2)
            .map(|p| to_frame(p[0] / input + anchor[0], p[1] / input + anchor[1]))
            .collect();

        candidates.push(PalmRegion {
            bbox: clamp_box([x1, y1, x2, y2], letterbox.orig_w, letterbox.orig_h),
            landmarks,
            score,
        });
    }

    let keep = nms(&candidates, cfg.nms_threshold, cfg.top_k);
    Ok(keep.into_iter().map(|i| candidates[i].clone()).collect())
}

/// Square rotated crop around a palm: centre, side length and rotation that
/// turns the palm upright.
pub fn crop_from_palm(region: &PalmRegion) -> ((f32, f32), f32, f32) {
    let [x1, y1, x2, y2] = region.bbox;
    let center = mean(&region.landmarks).unwrap_or(((x1 + x2) * 0.5, (y1 + y2) * 0.5));

    let keypoint_span = if region.landmarks.is_empty() {
        0.0
    } else {
        let (min_x, max_x, min_y, max_y) = region.landmarks.iter().fold(
            (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
            |acc, &(x, y)| (acc.0.min(x), acc.1.max(x), acc.2.min(y), acc.3.max(y)),
        );
        (max_x - min_x).max(max_y - min_y)
    };
    let side = (x2 - x1)
        .abs()
        .max((y2 - y1).abs())
        .max(keypoint_span)
        .max(MIN_CROP_SIDE)
        * CROP_EXPANSION;

    (center, side, palm_orientation(region))
}

/// Principal axis of the palm keypoints, rotated a quarter turn so the
/// fingers point up in the crop.
pub fn palm_orientation(region: &PalmRegion) -> f32 {
    if region.landmarks.len() < 2 {
        return 0.0;
    }
    let Some((mx, my)) = mean(&region.landmarks) else {
        return 0.0;
    };

    let n = region.landmarks.len() as f32;
    let (mut xx, mut xy, mut yy) = (0.0f32, 0.0f32, 0.0f32);
    for &(x, y) in &region.landmarks {
        let (dx, dy) = (x - mx, y - my);
        xx += dx * dx;
        xy += dx * dy;
        yy += dy * dy;
    }
    let (xx, xy, yy) = (xx / n, xy / n, yy / n);

    let half_trace = (xx + yy) * 0.5;
    let det = xx * yy - xy * xy;
    let lambda = (half_trace + (half_trace * half_trace - det).max(0.0).sqrt()).max(1e-6);
    let (vx, vy) = if xy.abs() > 1e-6 {
        (lambda - yy, xy)
    } else if xx >= yy {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };

    vy.atan2(vx) - FRAC_PI_2
}

fn mean(points: &[(f32, f32)]) -> Option<(f32, f32)> {
    if points.is_empty() {
        return None;
    }
    let (sx, sy) = points
        .iter()
        .fold((0.0f32, 0.0f32), |acc, &(x, y)| (acc.0 + x, acc.1 + y));
    let n = points.len() as f32;
    Some((sx / n, sy / n))
}

fn nms(candidates: &[PalmRegion], threshold: f32, top_k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        candidates[b]
            .score
            .partial_cmp(&candidates[a].score)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<usize> = Vec::new();
    for idx in order {
        if keep.len() >= top_k {
            break;
        }
        let overlaps = keep
            .iter()
            .any(|&k| iou(&candidates[idx].bbox, &candidates[k].bbox) >= threshold);
        if !overlaps {
            keep.push(idx);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn clamp_box(bbox: [f32; 4], w: u32, h: u32) -> [f32; 4] {
    let max_x = w.saturating_sub(1) as f32;
    let max_y = h.saturating_sub(1) as f32;
    [
        bbox[0].clamp(0.0, max_x),
        bbox[1].clamp(0.0, max_y),
        bbox[2].clamp(0.0, max_x),
        bbox[3].clamp(0.0, max_y),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(bbox: [f32; 4], score: f32) -> PalmRegion {
        PalmRegion {
            bbox,
            landmarks: Vec::new(),
            score,
        }
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
        assert!((iou(&a, &[5.0, 0.0, 15.0, 10.0]) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn nms_keeps_best_of_overlapping_boxes() {
        let candidates = vec![
            region([0.0, 0.0, 10.0, 10.0], 0.6),
            region([1.0, 1.0, 11.0, 11.0], 0.9),
            region([50.0, 50.0, 60.0, 60.0], 0.7),
        ];
        assert_eq!(nms(&candidates, 0.3, 10), vec![1, 2]);
        assert_eq!(nms(&candidates, 0.3, 1), vec![1]);
    }

    #[test]
    fn decode_maps_confident_anchor_to_frame_pixels() {
        let anchors = generate_anchors();
        let mut boxes = vec![0.0f32; NUM_ANCHORS * BOX_FEATURES];
        let mut scores = vec![-10.0f32; NUM_ANCHORS];

        // Anchor 0 sits at (0.5/24, 0.5/24); shift it to the input centre.
        let target = 0.5 - anchors[0][0];
        boxes[0] = target * PALM_INPUT_SIZE as f32;
        boxes[1] = target * PALM_INPUT_SIZE as f32;
        boxes[2] = 0.25 * PALM_INPUT_SIZE as f32;
        boxes[3] = 0.25 * PALM_INPUT_SIZE as f32;
        for k in 0..PALM_KEYPOINTS {
            boxes[4 + k * 2] = boxes[0];
            boxes[4 + k * 2 + 1] = boxes[1];
        }
        scores[0] = 5.0;

        let letterbox = Letterbox {
            scale: 192.0 / 400.0,
            pad_x: 0.0,
            pad_y: 0.0,
            orig_w: 400,
            orig_h: 400,
        };
        let palms = decode_palms(
            &boxes,
            &scores,
            &anchors,
            &letterbox,
            &PalmDetectorConfig::default(),
        )
        .unwrap();

        assert_eq!(palms.len(), 1);
        let [x1, y1, x2, y2] = palms[0].bbox;
        assert!((x1 - 150.0).abs() < 0.5 && (y1 - 150.0).abs() < 0.5);
        assert!((x2 - 250.0).abs() < 0.5 && (y2 - 250.0).abs() < 0.5);
        assert_eq!(palms[0].landmarks.len(), PALM_KEYPOINTS);
        assert!(palms[0].score > 0.99);
    }

    #[test]
    fn decode_rejects_short_outputs() {
        let anchors = generate_anchors();
        let letterbox = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            orig_w: 192,
            orig_h: 192,
        };
        let result = decode_palms(
            &[0.0; 10],
            &[0.0; 10],
            &anchors,
            &letterbox,
            &PalmDetectorConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn crop_is_centred_on_keypoints_and_expanded() {
        let palm = PalmRegion {
            bbox: [100.0, 100.0, 200.0, 200.0],
            landmarks: vec![(140.0, 150.0), (160.0, 150.0)],
            score: 0.9,
        };
        let (center, side, angle) = crop_from_palm(&palm);
        assert_eq!(center, (150.0, 150.0));
        assert!((side - 240.0).abs() < 1e-3);
        // Horizontal spread maps to a quarter turn.
        assert!((angle + FRAC_PI_2).abs() < 1e-5);
    }
}
