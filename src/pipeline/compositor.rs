use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, never, select};
use rayon::prelude::*;

use super::overlay::Overlay;
use crate::types::{Frame, RecognizedFrame};

/// A camera frame with the most recent overlay blended in, ready to display.
#[derive(Clone, Debug)]
pub struct CompositedFrame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub hand_detected: bool,
    pub confidence: f32,
}

/// Blends `overlay` over `frame`. An overlay of a different size is ignored.
pub fn composite(frame: &Frame, overlay: Option<&Overlay>) -> Vec<u8> {
    let mut rgba = frame.rgba.clone();
    let Some(overlay) = overlay else {
        return rgba;
    };
    if overlay.width() != frame.width || overlay.height() != frame.height {
        log::debug!(
            "skipping stale overlay {}x{} for frame {}x{}",
            overlay.width(),
            overlay.height(),
            frame.width,
            frame.height
        );
        return rgba;
    }

    rgba.par_chunks_exact_mut(4)
        .zip(overlay.rgba().par_chunks_exact(4))
        .for_each(|(dst, src)| match src[3] {
            0 => {}
            255 => dst[..3].copy_from_slice(&src[..3]),
            alpha => {
                let a = alpha as u16;
                for c in 0..3 {
                    dst[c] = ((src[c] as u16 * a + dst[c] as u16 * (255 - a)) / 255) as u8;
                }
            }
        });
    rgba
}

/// Runs at camera rate, reusing the latest recognizer overlay for every frame
/// until a newer one arrives.
pub fn start_frame_compositor(
    frame_rx: Receiver<Frame>,
    recognized_rx: Receiver<RecognizedFrame>,
    composited_tx: Sender<CompositedFrame>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || run_compositor_loop(frame_rx, recognized_rx, composited_tx))
}

fn run_compositor_loop(
    frame_rx: Receiver<Frame>,
    recognized_rx: Receiver<RecognizedFrame>,
    composited_tx: Sender<CompositedFrame>,
) {
    let mut latest: Option<RecognizedFrame> = None;
    let idle = never();
    let mut recognizer_open = true;

    loop {
        let overlay_rx = if recognizer_open { &recognized_rx } else { &idle };
        select! {
            recv(overlay_rx) -> msg => match msg {
                Ok(recognized) => latest = Some(recognized),
                Err(_) => {
                    log::debug!("recognizer stopped, compositing without overlay updates");
                    recognizer_open = false;
                }
            },
            recv(frame_rx) -> msg => {
                let Ok(frame) = msg else {
                    log::debug!("camera frames closed, stopping compositor");
                    break;
                };
                let overlay = latest.as_ref().map(|r| r.overlay.as_ref());
                let composited = CompositedFrame {
                    rgba: composite(&frame, overlay),
                    width: frame.width,
                    height: frame.height,
                    hand_detected: latest.as_ref().is_some_and(|r| r.hand_detected),
                    confidence: latest.as_ref().map(|r| r.confidence).unwrap_or(0.0),
                };
                if let Err(TrySendError::Disconnected(_)) = composited_tx.try_send(composited) {
                    log::debug!("display closed, stopping compositor");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::hand_with_index;
    use crossbeam_channel::bounded;
    use std::{
        sync::Arc,
        time::{Duration, Instant},
    };

    fn solid_frame(width: u32, height: u32, color: [u8; 4]) -> Frame {
        Frame {
            rgba: color.repeat(width as usize * height as usize),
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    fn overlay_with_point(width: u32, height: u32, x: f32, y: f32) -> Overlay {
        let mut overlay = Overlay::new(width, height);
        let mut hand = hand_with_index(0.0, 0.0);
        hand.landmarks = vec![(x, y)];
        overlay.draw_landmarks(&hand);
        overlay
    }

    #[test]
    fn opaque_overlay_pixels_replace_video() {
        let frame = solid_frame(32, 32, [10, 200, 30, 255]);
        let overlay = overlay_with_point(32, 32, 16.0, 16.0);
        let out = composite(&frame, Some(&overlay));

        let at = |x: usize, y: usize| {
            let i = (y * 32 + x) * 4;
            [out[i], out[i + 1], out[i + 2], out[i + 3]]
        };
        assert_eq!(at(16, 16), [255, 0, 0, 255]);
        assert_eq!(at(0, 0), [10, 200, 30, 255]);
    }

    #[test]
    fn mismatched_overlay_is_ignored() {
        let frame = solid_frame(16, 16, [1, 2, 3, 255]);
        let overlay = overlay_with_point(32, 32, 4.0, 4.0);
        assert_eq!(composite(&frame, Some(&overlay)), frame.rgba);
        assert_eq!(composite(&frame, None), frame.rgba);
    }

    #[test]
    fn compositor_applies_latest_overlay() {
        let (frame_tx, frame_rx) = bounded(1);
        let (recognized_tx, recognized_rx) = bounded(1);
        let (out_tx, out_rx) = bounded(1);
        let handle = start_frame_compositor(frame_rx, recognized_rx, out_tx);

        recognized_tx
            .send(RecognizedFrame {
                width: 8,
                height: 8,
                timestamp: Instant::now(),
                hand_detected: true,
                confidence: 0.75,
                gesture: None,
                overlay: Arc::new(overlay_with_point(8, 8, 4.0, 4.0)),
            })
            .unwrap();
        // Let the overlay land before the frame.
        std::thread::sleep(Duration::from_millis(50));
        frame_tx.send(solid_frame(8, 8, [0, 0, 0, 255])).unwrap();

        let out = out_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(out.hand_detected);
        assert!((out.confidence - 0.75).abs() < 1e-6);
        let i = (4 * 8 + 4) * 4;
        assert_eq!(&out.rgba[i..i + 4], &[255, 0, 0, 255]);

        drop(frame_tx);
        handle.join().unwrap();
    }
}
