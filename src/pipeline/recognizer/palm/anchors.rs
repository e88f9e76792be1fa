//! SSD anchors for the 192×192 MediaPipe palm detector.
//!
//! Four layers with strides 8, 16, 16, 16 and two anchors per layer. Layers
//! that share a stride are merged into one grid, so the 8-stride grid carries
//! 2 anchors per cell and the 16-stride grid carries 6. Every anchor is unit
//! sized, only its centre matters.

use super::super::common::PALM_INPUT_SIZE;

pub const NUM_ANCHORS: usize = 2016;

const STRIDES: [u32; 4] = [8, 16, 16, 16];
const ANCHORS_PER_LAYER: usize = 2;
const ANCHOR_OFFSET: f32 = 0.5;

/// Anchor centres as `[cx, cy]` in normalised input coordinates.
pub fn generate_anchors() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    let mut layer = 0;

    while layer < STRIDES.len() {
        let stride = STRIDES[layer];
        let mut per_cell = 0;
        while layer < STRIDES.len() && STRIDES[layer] == stride {
            per_cell += ANCHORS_PER_LAYER;
            layer += 1;
        }

        let grid = PALM_INPUT_SIZE.div_ceil(stride);
        for y in 0..grid {
            let cy = (y as f32 + ANCHOR_OFFSET) / grid as f32;
            for x in 0..grid {
                let cx = (x as f32 + ANCHOR_OFFSET) / grid as f32;
                anchors.extend(std::iter::repeat_n([cx, cy], per_cell));
            }
        }
    }

    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_count_matches_detector_output() {
        assert_eq!(generate_anchors().len(), NUM_ANCHORS);
    }

    #[test]
    fn anchors_are_laid_out_row_major_per_grid() {
        let anchors = generate_anchors();
        assert_eq!(anchors[0], [0.5 / 24.0, 0.5 / 24.0]);
        assert_eq!(anchors[1], anchors[0]);
        assert_eq!(anchors[2], [1.5 / 24.0, 0.5 / 24.0]);

        // First cell of the 12×12 grid follows the 24×24×2 block.
        let coarse = &anchors[24 * 24 * 2..];
        assert_eq!(coarse[0], [0.5 / 12.0, 0.5 / 12.0]);
        assert_eq!(coarse[5], coarse[0]);
        assert_eq!(coarse[6], [1.5 / 12.0, 0.5 / 12.0]);
        assert_eq!(*anchors.last().unwrap(), [11.5 / 12.0, 11.5 / 12.0]);
    }
}
