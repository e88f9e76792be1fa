mod common;
mod ort;
mod palm;

use std::{path::PathBuf, sync::Arc, thread, time::Duration};

use crossbeam_channel::{Receiver, Sender};

use super::overlay::Overlay;
use crate::{
    action::{GestureSink, trigger_action},
    config::AppConfig,
    gesture::ScrollGestureRecognizer,
    model_download::{ModelKind, model_path},
    types::{Frame, HandPrediction, RecognizedFrame},
};

/// Anything that turns a frame into hand predictions, best hand first.
pub(crate) trait HandposeEngine: Send + 'static {
    fn infer(&mut self, frame: &Frame) -> anyhow::Result<Vec<HandPrediction>>;
}

#[derive(Clone, Debug)]
pub struct RecognizerBackend {
    model_dir: PathBuf,
    max_hands: usize,
    min_hand_confidence: f32,
    cooldown: Duration,
}

impl RecognizerBackend {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            model_dir: cfg.model_dir.clone(),
            max_hands: cfg.max_hands,
            min_hand_confidence: cfg.min_hand_confidence,
            cooldown: cfg.cooldown,
        }
    }

    pub fn model_path(&self, kind: ModelKind) -> PathBuf {
        model_path(&self.model_dir, kind)
    }

    pub fn max_hands(&self) -> usize {
        self.max_hands
    }

    pub fn label(&self) -> &'static str {
        "ort"
    }
}

impl Default for RecognizerBackend {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

pub fn start_recognizer<S: GestureSink>(
    backend: RecognizerBackend,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<RecognizedFrame>,
    sink: S,
) -> thread::JoinHandle<()> {
    log::info!("starting handpose backend: {}", backend.label());
    ort::start_worker(backend, frame_rx, result_tx, sink)
}

/// Everything that happens to one frame after inference: the overlay is
/// cleared and redrawn, the first hand is checked for a swipe, and any
/// gesture is dispatched.
pub(crate) struct FrameProcessor<S> {
    recognizer: ScrollGestureRecognizer,
    overlay: Arc<Overlay>,
    min_hand_confidence: f32,
    sink: S,
}

impl<S: GestureSink> FrameProcessor<S> {
    pub(crate) fn new(backend: &RecognizerBackend, sink: S) -> Self {
        Self {
            recognizer: ScrollGestureRecognizer::new(backend.cooldown),
            overlay: Arc::new(Overlay::new(0, 0)),
            min_hand_confidence: backend.min_hand_confidence,
            sink,
        }
    }

    pub(crate) fn process(&mut self, frame: &Frame, hands: Vec<HandPrediction>) -> RecognizedFrame {
        // Copies only if the compositor still holds the previous overlay.
        let canvas = Arc::make_mut(&mut self.overlay);
        canvas.fit_to(frame.width, frame.height);
        canvas.clear();

        let hand = hands
            .into_iter()
            .find(|h| h.score >= self.min_hand_confidence);

        let mut gesture = None;
        if let Some(hand) = &hand {
            canvas.draw_hand_skeleton(hand);
            canvas.draw_landmarks(hand);
            gesture = self.recognizer.recognize(hand, frame.timestamp);
            trigger_action(&mut self.sink, gesture.as_ref());
        }

        RecognizedFrame {
            width: frame.width,
            height: frame.height,
            timestamp: frame.timestamp,
            hand_detected: hand.is_some(),
            confidence: hand.as_ref().map(|h| h.score).unwrap_or(0.0),
            gesture,
            overlay: Arc::clone(&self.overlay),
        }
    }
}

fn run_worker_loop<E: HandposeEngine, S: GestureSink>(
    mut engine: E,
    mut processor: FrameProcessor<S>,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<RecognizedFrame>,
) {
    while let Some(frame) = recv_latest_frame(&frame_rx) {
        let hands = match engine.infer(&frame) {
            Ok(hands) => hands,
            Err(err) => {
                log::warn!("handpose inference failed: {err:?}");
                continue;
            }
        };
        log::debug!("{} hand(s) in {}x{} frame", hands.len(), frame.width, frame.height);

        let recognized = processor.process(&frame, hands);
        let _ = result_tx.try_send(recognized);
    }
    log::info!("frame source closed, recognizer stopping");
}

// A busy model never builds a backlog: only the newest frame is processed.
fn recv_latest_frame(frame_rx: &Receiver<Frame>) -> Option<Frame> {
    let mut frame = frame_rx.recv().ok()?;
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Some(frame)
}
