use std::{fmt, sync::Arc, time::Instant};

use crate::pipeline::overlay::Overlay;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

/// One hand found in a frame. `landmarks` are in frame pixels, 21 points
/// ordered wrist, thumb, index, middle, ring, pinky.
#[derive(Clone, Debug)]
pub struct HandPrediction {
    pub landmarks: Vec<(f32, f32)>,
    #[allow(dead_code)]
    pub raw_landmarks: Vec<[f32; 3]>,
    pub score: f32,
    #[allow(dead_code)]
    pub handedness: f32,
}

impl HandPrediction {
    pub fn landmark(&self, idx: usize) -> Option<(f32, f32)> {
        self.landmarks.get(idx).copied()
    }
}

#[derive(Clone, Debug)]
pub struct PalmRegion {
    pub bbox: [f32; 4],
    pub landmarks: Vec<(f32, f32)>,
    pub score: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwipeDirection {
    Left,
    Right,
}

impl SwipeDirection {
    pub fn label(&self) -> &'static str {
        match self {
            SwipeDirection::Left => "swipeLeft",
            SwipeDirection::Right => "swipeRight",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollGesture {
    ScrollUp,
    ScrollDown,
}

impl ScrollGesture {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollGesture::ScrollUp => "scrollUp",
            ScrollGesture::ScrollDown => "scrollDown",
        }
    }
}

impl From<SwipeDirection> for ScrollGesture {
    fn from(direction: SwipeDirection) -> Self {
        match direction {
            SwipeDirection::Right => ScrollGesture::ScrollDown,
            SwipeDirection::Left => ScrollGesture::ScrollUp,
        }
    }
}

impl fmt::Display for ScrollGesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GestureEvent {
    pub gesture: ScrollGesture,
    pub direction: SwipeDirection,
    pub timestamp: Instant,
}

impl GestureEvent {
    pub fn display_text(&self) -> String {
        format!("Gesture: {}", self.gesture)
    }
}

/// Result of one pass of the recognizer over a frame.
#[derive(Clone, Debug)]
pub struct RecognizedFrame {
    pub width: u32,
    pub height: u32,
    #[allow(dead_code)]
    pub timestamp: Instant,
    pub hand_detected: bool,
    pub confidence: f32,
    pub gesture: Option<GestureEvent>,
    pub overlay: Arc<Overlay>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swipe_right_scrolls_down_and_left_scrolls_up() {
        assert_eq!(
            ScrollGesture::from(SwipeDirection::Right),
            ScrollGesture::ScrollDown
        );
        assert_eq!(
            ScrollGesture::from(SwipeDirection::Left),
            ScrollGesture::ScrollUp
        );
    }

    #[test]
    fn gesture_display_uses_camel_case_names() {
        let event = GestureEvent {
            gesture: ScrollGesture::ScrollDown,
            direction: SwipeDirection::Right,
            timestamp: Instant::now(),
        };
        assert_eq!(event.display_text(), "Gesture: scrollDown");
        assert_eq!(ScrollGesture::ScrollUp.to_string(), "scrollUp");
    }
}
