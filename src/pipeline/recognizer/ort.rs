use std::{cmp::Ordering, path::Path, thread};

use anyhow::{Context, Result, ensure};
use crossbeam_channel::{Receiver, Sender};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    FrameProcessor, HandposeEngine, RecognizerBackend,
    common::{self, HANDPOSE_INPUT_SIZE},
    palm::{PalmDetector, PalmDetectorConfig, crop_from_palm},
    run_worker_loop,
};
use crate::{
    action::GestureSink,
    model_download::{ModelKind, ensure_model_ready},
    types::{Frame, HandPrediction, PalmRegion, RecognizedFrame},
};

pub fn start_worker<S: GestureSink>(
    backend: RecognizerBackend,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<RecognizedFrame>,
    sink: S,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let handpose_path = backend.model_path(ModelKind::HandposeEstimator);
        let palm_path = backend.model_path(ModelKind::PalmDetector);

        for (kind, path) in [
            (ModelKind::HandposeEstimator, &handpose_path),
            (ModelKind::PalmDetector, &palm_path),
        ] {
            if let Err(err) = ensure_model_ready(kind, path, |_evt| {}) {
                log::error!(
                    "failed to prepare {} model at {}: {err:?}",
                    kind.label(),
                    path.display()
                );
                return;
            }
        }

        let engine = match OrtEngine::new(&handpose_path, &palm_path, backend.max_hands()) {
            Ok(engine) => {
                log::info!(
                    "handpose ORT backend ready using {} and palm detector {}",
                    handpose_path.display(),
                    palm_path.display()
                );
                engine
            }
            Err(err) => {
                log::error!("failed to load ORT handpose model: {err:?}");
                return;
            }
        };

        let processor = FrameProcessor::new(&backend, sink);
        run_worker_loop(engine, processor, frame_rx, result_tx);
    })
}

struct OrtEngine {
    handpose: Session,
    palm_detector: PalmDetector,
    max_hands: usize,
}

impl OrtEngine {
    fn new(handpose_path: &Path, palm_path: &Path, max_hands: usize) -> Result<Self> {
        let handpose = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(handpose_path)
            .with_context(|| {
                format!("failed to load ORT session from {}", handpose_path.display())
            })?;

        let palm_detector = PalmDetector::new(palm_path, PalmDetectorConfig::default())?;

        Ok(Self {
            handpose,
            palm_detector,
            max_hands: max_hands.max(1),
        })
    }

    fn estimate(&mut self, frame: &Frame, palm: &PalmRegion) -> Result<HandPrediction> {
        let (center, side, angle) = crop_from_palm(palm);
        let (input, transform) =
            common::rotated_crop(frame, center, side, angle, HANDPOSE_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .handpose
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;
        ensure!(outputs.len() >= 1, "model returned no outputs");

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flat: Vec<f32> = coords.iter().copied().collect();
        let raw_landmarks = common::decode_landmarks(&flat)?;

        let scalar = |idx: usize| -> f32 {
            if idx >= outputs.len() {
                return 0.0;
            }
            outputs[idx]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        };
        let confidence = scalar(1);
        let handedness = scalar(2);

        Ok(HandPrediction {
            landmarks: common::project_landmarks(&raw_landmarks, &transform),
            raw_landmarks,
            score: (confidence * palm.score).clamp(0.0, 1.0),
            handedness,
        })
    }
}

impl HandposeEngine for OrtEngine {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<HandPrediction>> {
        let palms = self.palm_detector.detect(frame).unwrap_or_else(|err| {
            log::warn!("palm detection failed: {err:?}");
            Vec::new()
        });

        let mut hands = Vec::with_capacity(self.max_hands);
        for palm in palms.iter().take(self.max_hands) {
            hands.push(self.estimate(frame, palm)?);
        }
        hands.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        Ok(hands)
    }
}
