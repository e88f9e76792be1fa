use crate::types::HandPrediction;

/// Bones between the 21 hand landmarks, one finger chain at a time from the wrist.
pub const HAND_CONNECTIONS: &[(usize, usize)] = &[
    // thumb
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    // index
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    // middle
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    // ring
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    // pinky
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
];

pub const BONE_COLOR: [u8; 4] = [0, 0, 255, 255];
pub const BONE_WIDTH: i32 = 2;
pub const LANDMARK_COLOR: [u8; 4] = [255, 0, 0, 255];
pub const LANDMARK_RADIUS: i32 = 5;

/// Transparent RGBA layer drawn over the video.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    rgba: Vec<u8>,
    width: u32,
    height: u32,
}

impl Overlay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            rgba: vec![0u8; width as usize * height as usize * 4],
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Matches the overlay to the video size. Resizing discards the contents.
    pub fn fit_to(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        log::debug!(
            "resizing overlay {}x{} -> {width}x{height}",
            self.width,
            self.height
        );
        *self = Self::new(width, height);
    }

    pub fn clear(&mut self) {
        self.rgba.fill(0);
    }

    #[cfg(test)]
    pub fn is_blank(&self) -> bool {
        self.rgba.chunks_exact(4).all(|px| px[3] == 0)
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.rgba
            .get(idx..idx + 4)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }

    pub fn draw_hand_skeleton(&mut self, hand: &HandPrediction) {
        for &(start, end) in HAND_CONNECTIONS {
            if let (Some(a), Some(b)) = (hand.landmark(start), hand.landmark(end)) {
                self.draw_line(a, b, BONE_COLOR, BONE_WIDTH);
            }
        }
    }

    pub fn draw_landmarks(&mut self, hand: &HandPrediction) {
        for &(x, y) in &hand.landmarks {
            self.fill_circle(
                (x.round() as i32, y.round() as i32),
                LANDMARK_RADIUS,
                LANDMARK_COLOR,
            );
        }
    }

    fn draw_line(&mut self, p0: (f32, f32), p1: (f32, f32), color: [u8; 4], width: i32) {
        let (mut x0, mut y0) = (p0.0.round() as i32, p0.1.round() as i32);
        let (x1, y1) = (p1.0.round() as i32, p1.1.round() as i32);
        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let brush = width.max(1) / 2;

        loop {
            self.fill_circle((x0, y0), brush, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn fill_circle(&mut self, center: (i32, i32), radius: i32, color: [u8; 4]) {
        let (cx, cy) = center;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn put_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        if let Some(px) = self.rgba.get_mut(idx..idx + 4) {
            px.copy_from_slice(&color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::hand_with_index;

    #[test]
    fn connections_cover_every_landmark_once_per_bone() {
        assert_eq!(HAND_CONNECTIONS.len(), 20);
        for idx in 1..21 {
            let incoming = HAND_CONNECTIONS.iter().filter(|(_, b)| *b == idx).count();
            assert_eq!(incoming, 1, "landmark {idx} should have one parent bone");
        }
    }

    #[test]
    fn new_overlay_is_transparent() {
        let overlay = Overlay::new(8, 4);
        assert_eq!(overlay.rgba().len(), 8 * 4 * 4);
        assert!(overlay.is_blank());
    }

    #[test]
    fn landmarks_are_red_discs() {
        let mut overlay = Overlay::new(64, 64);
        let mut hand = hand_with_index(0.0, 0.0);
        hand.landmarks = vec![(20.0, 20.0)];
        overlay.draw_landmarks(&hand);

        assert_eq!(overlay.pixel(20, 20), Some(LANDMARK_COLOR));
        assert_eq!(overlay.pixel(25, 20), Some(LANDMARK_COLOR));
        assert_eq!(overlay.pixel(24, 24), Some([0, 0, 0, 0]));
        assert_eq!(overlay.pixel(26, 20), Some([0, 0, 0, 0]));
    }

    #[test]
    fn skeleton_bones_are_blue() {
        let mut overlay = Overlay::new(64, 64);
        let mut hand = hand_with_index(0.0, 0.0);
        hand.landmarks = (0..21).map(|_| (10.0, 10.0)).collect();
        hand.landmarks[1] = (40.0, 10.0);
        overlay.draw_hand_skeleton(&hand);

        assert_eq!(overlay.pixel(25, 10), Some(BONE_COLOR));
        assert_eq!(overlay.pixel(25, 11), Some(BONE_COLOR));
        assert_eq!(overlay.pixel(25, 13), Some([0, 0, 0, 0]));
    }

    #[test]
    fn off_canvas_points_are_clipped() {
        let mut overlay = Overlay::new(16, 16);
        let mut hand = hand_with_index(0.0, 0.0);
        hand.landmarks = vec![(-40.0, -40.0), (500.0, 3.0)];
        overlay.draw_landmarks(&hand);
        assert!(overlay.is_blank());
    }

    #[test]
    fn clear_and_resize_reset_contents() {
        let mut overlay = Overlay::new(32, 32);
        let mut hand = hand_with_index(0.0, 0.0);
        hand.landmarks = vec![(10.0, 12.0)];
        overlay.draw_landmarks(&hand);
        assert!(!overlay.is_blank());

        overlay.clear();
        assert!(overlay.is_blank());

        overlay.draw_landmarks(&hand);
        overlay.fit_to(32, 32);
        assert!(!overlay.is_blank());
        overlay.fit_to(20, 10);
        assert_eq!((overlay.width(), overlay.height()), (20, 10));
        assert!(overlay.is_blank());
    }
}
