use std::time::{Duration, Instant};

use crate::types::{GestureEvent, HandPrediction, ScrollGesture, SwipeDirection};

pub const INDEX_FINGER_PIP: usize = 6;
pub const INDEX_FINGER_TIP: usize = 8;

/// Suppresses repeated emissions until a deadline passes. The deadline is
/// compared against frame timestamps, so it expires on its own.
#[derive(Clone, Debug)]
pub struct Cooldown {
    window: Duration,
    until: Option<Instant>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            until: None,
        }
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    pub fn arm(&mut self, now: Instant) {
        self.until = Some(now + self.window);
    }
}

pub struct ScrollGestureRecognizer {
    cooldown: Cooldown,
}

impl ScrollGestureRecognizer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: Cooldown::new(cooldown),
        }
    }

    pub fn recognize(&mut self, hand: &HandPrediction, now: Instant) -> Option<GestureEvent> {
        if self.cooldown.is_active(now) {
            return None;
        }

        let direction = swipe_direction(hand)?;
        let gesture = ScrollGesture::from(direction);
        match direction {
            SwipeDirection::Right => log::info!("gesture recognized: swipe right (scroll down)"),
            SwipeDirection::Left => log::info!("gesture recognized: swipe left (scroll up)"),
        }

        self.cooldown.arm(now);
        Some(GestureEvent {
            gesture,
            direction,
            timestamp: now,
        })
    }
}

/// Index fingertip right of the index middle joint is a right swipe, left of
/// it a left swipe. Equal x means no swipe.
pub fn swipe_direction(hand: &HandPrediction) -> Option<SwipeDirection> {
    let (tip_x, _) = hand.landmark(INDEX_FINGER_TIP)?;
    let (joint_x, _) = hand.landmark(INDEX_FINGER_PIP)?;

    if tip_x > joint_x {
        Some(SwipeDirection::Right)
    } else if tip_x < joint_x {
        Some(SwipeDirection::Left)
    } else {
        None
    }
}

#[cfg(test)]
pub(crate) fn hand_with_index(tip_x: f32, joint_x: f32) -> HandPrediction {
    let mut landmarks: Vec<(f32, f32)> = (0..21).map(|i| (100.0, 100.0 + i as f32)).collect();
    landmarks[INDEX_FINGER_PIP] = (joint_x, 80.0);
    landmarks[INDEX_FINGER_TIP] = (tip_x, 60.0);
    HandPrediction {
        raw_landmarks: landmarks.iter().map(|&(x, y)| [x, y, 0.0]).collect(),
        landmarks,
        score: 0.9,
        handedness: 0.8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(3_000);

    #[test]
    fn tip_right_of_joint_scrolls_down() {
        let mut recognizer = ScrollGestureRecognizer::new(WINDOW);
        let event = recognizer
            .recognize(&hand_with_index(150.0, 120.0), Instant::now())
            .unwrap();
        assert_eq!(event.gesture, ScrollGesture::ScrollDown);
        assert_eq!(event.direction, SwipeDirection::Right);
    }

    #[test]
    fn tip_left_of_joint_scrolls_up() {
        let mut recognizer = ScrollGestureRecognizer::new(WINDOW);
        let event = recognizer
            .recognize(&hand_with_index(90.0, 120.0), Instant::now())
            .unwrap();
        assert_eq!(event.gesture, ScrollGesture::ScrollUp);
    }

    #[test]
    fn equal_x_emits_nothing_and_does_not_arm() {
        let mut recognizer = ScrollGestureRecognizer::new(WINDOW);
        let start = Instant::now();
        assert!(recognizer
            .recognize(&hand_with_index(120.0, 120.0), start)
            .is_none());
        assert!(recognizer
            .recognize(&hand_with_index(121.0, 120.0), start + Duration::from_millis(1))
            .is_some());
    }

    #[test]
    fn emissions_are_suppressed_for_the_cooldown_window() {
        let mut recognizer = ScrollGestureRecognizer::new(WINDOW);
        let start = Instant::now();
        let right = hand_with_index(150.0, 120.0);
        let left = hand_with_index(90.0, 120.0);

        assert!(recognizer.recognize(&right, start).is_some());
        assert!(recognizer
            .recognize(&left, start + Duration::from_millis(100))
            .is_none());
        assert!(recognizer
            .recognize(&right, start + Duration::from_millis(2_999))
            .is_none());

        let event = recognizer
            .recognize(&left, start + Duration::from_millis(3_000))
            .unwrap();
        assert_eq!(event.gesture, ScrollGesture::ScrollUp);
        assert!(recognizer
            .recognize(&right, start + Duration::from_millis(3_500))
            .is_none());
    }

    #[test]
    fn missing_landmarks_yield_no_direction() {
        let mut hand = hand_with_index(150.0, 120.0);
        hand.landmarks.truncate(7);
        assert_eq!(swipe_direction(&hand), None);
    }

    #[test]
    fn cooldown_starts_inactive() {
        let cooldown = Cooldown::new(WINDOW);
        assert!(!cooldown.is_active(Instant::now()));
    }
}
