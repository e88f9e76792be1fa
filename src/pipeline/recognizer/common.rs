use anyhow::{Context, Result, anyhow, ensure};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::Frame;

pub const HANDPOSE_INPUT_SIZE: u32 = 224;
pub const PALM_INPUT_SIZE: u32 = 192;
pub const NUM_LANDMARKS: usize = 21;

/// How a frame was scaled and padded into a square model input.
#[derive(Clone, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

/// Maps pixels of a rotated square crop back into the source frame.
#[derive(Clone, Debug, PartialEq)]
pub struct CropTransform {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
    pub output_size: u32,
    pub orig_w: u32,
    pub orig_h: u32,
}

impl CropTransform {
    pub fn project(&self, x: f32, y: f32) -> (f32, f32) {
        let half = self.output_size as f32 / 2.0;
        let (src_x, src_y) = self.rotate_out((x - half, y - half));
        (
            src_x.clamp(0.0, self.orig_w.saturating_sub(1) as f32),
            src_y.clamp(0.0, self.orig_h.saturating_sub(1) as f32),
        )
    }

    fn rotate_out(&self, offset: (f32, f32)) -> (f32, f32) {
        let scale = self.side / self.output_size as f32;
        let (dx, dy) = (offset.0 * scale, offset.1 * scale);
        let (sin, cos) = self.angle.sin_cos();
        (
            self.center.0 + dx * cos - dy * sin,
            self.center.1 + dx * sin + dy * cos,
        )
    }
}

fn check_frame(frame: &Frame) -> Result<()> {
    let expected = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    ensure!(
        frame.rgba.len() == expected,
        "frame buffer size mismatch: got {}, expected {}",
        frame.rgba.len(),
        expected
    );
    Ok(())
}

/// Resizes the frame to fit `target` on its long side, pads the rest black and
/// returns a 1×target×target×3 tensor with channels in 0..1.
pub fn letterbox_frame(frame: &Frame, target: u32) -> Result<(Array4<f32>, Letterbox)> {
    check_frame(frame)?;

    let scale = target as f32 / frame.width.max(frame.height).max(1) as f32;
    let new_w = ((frame.width as f32 * scale).round() as u32).clamp(1, target);
    let new_h = ((frame.height as f32 * scale).round() as u32).clamp(1, target);

    let src = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    fir::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .context("fast resize failed")?;
    let resized = dst.into_vec();

    let side = target as usize;
    let pad_x = (side - new_w as usize) / 2;
    let pad_y = (side - new_h as usize) / 2;
    let row_len = new_w as usize * 4;

    let mut tensor = vec![0.0f32; side * side * 3];
    tensor
        .par_chunks_exact_mut(side * 3)
        .enumerate()
        .for_each(|(y, row)| {
            if y < pad_y || y >= pad_y + new_h as usize {
                return;
            }
            let src_row = &resized[(y - pad_y) * row_len..(y - pad_y + 1) * row_len];
            for (x, px) in src_row.chunks_exact(4).enumerate() {
                let at = (pad_x + x) * 3;
                row[at] = px[0] as f32 / 255.0;
                row[at + 1] = px[1] as f32 / 255.0;
                row[at + 2] = px[2] as f32 / 255.0;
            }
        });

    let input = Array4::from_shape_vec((1, side, side, 3), tensor)
        .map_err(|err| anyhow!("failed to build letterbox tensor: {err}"))?;

    Ok((
        input,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            orig_w: frame.width,
            orig_h: frame.height,
        },
    ))
}

/// Samples an `output_size` square centred on `center`, `side` source pixels
/// wide and rotated by `angle`, with bilinear filtering.
pub fn rotated_crop(
    frame: &Frame,
    center: (f32, f32),
    side: f32,
    angle: f32,
    output_size: u32,
) -> Result<(Array4<f32>, CropTransform)> {
    check_frame(frame)?;

    let transform = CropTransform {
        center,
        side,
        angle,
        output_size,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    let size = output_size as usize;
    let half = output_size as f32 / 2.0;
    let mut data = vec![0.0f32; size * size * 3];
    data.par_chunks_exact_mut(size * 3)
        .enumerate()
        .for_each(|(y, row)| {
            let oy = y as f32 + 0.5 - half;
            for x in 0..size {
                let (sx, sy) = transform.rotate_out((x as f32 + 0.5 - half, oy));
                row[x * 3..x * 3 + 3].copy_from_slice(&sample_bilinear(frame, sx, sy));
            }
        });

    let input = Array4::from_shape_vec((1, size, size, 3), data)
        .map_err(|err| anyhow!("failed to build crop tensor: {err}"))?;
    Ok((input, transform))
}

fn sample_bilinear(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if !x.is_finite() || !y.is_finite() {
        return [0.0; 3];
    }

    let texel = |ix: i64, iy: i64| -> [f32; 3] {
        if ix < 0 || iy < 0 || ix >= frame.width as i64 || iy >= frame.height as i64 {
            return [0.0; 3];
        }
        let idx = (iy as usize * frame.width as usize + ix as usize) * 4;
        match frame.rgba.get(idx..idx + 3) {
            Some(px) => [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ],
            None => [0.0; 3],
        }
    };

    // Pixel centres sit at +0.5.
    let (fx, fy) = (x - 0.5, y - 0.5);
    let (x0, y0) = (fx.floor(), fy.floor());
    let (tx, ty) = (fx - x0, fy - y0);
    let (ix, iy) = (x0 as i64, y0 as i64);

    let c00 = texel(ix, iy);
    let c10 = texel(ix + 1, iy);
    let c01 = texel(ix, iy + 1);
    let c11 = texel(ix + 1, iy + 1);

    let mut out = [0.0f32; 3];
    for c in 0..3 {
        let top = c00[c] + (c10[c] - c00[c]) * tx;
        let bottom = c01[c] + (c11[c] - c01[c]) * tx;
        out[c] = top + (bottom - top) * ty;
    }
    out
}

pub fn decode_landmarks(flat: &[f32]) -> Result<Vec<[f32; 3]>> {
    ensure!(
        flat.len() >= NUM_LANDMARKS * 3,
        "unexpected landmarks length: got {}, need {}",
        flat.len(),
        NUM_LANDMARKS * 3
    );

    Ok(flat
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|c| [c[0], c[1], c[2]])
        .collect())
}

pub fn project_landmarks(landmarks: &[[f32; 3]], transform: &CropTransform) -> Vec<(f32, f32)> {
    landmarks
        .iter()
        .map(|[x, y, _z]| transform.project(*x, *y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{f32::consts::FRAC_PI_2, time::Instant};

    fn frame(width: u32, height: u32, fill: impl Fn(u32, u32) -> [u8; 4]) -> Frame {
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                rgba.extend_from_slice(&fill(x, y));
            }
        }
        Frame {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-3 && (a.1 - b.1).abs() < 1e-3
    }

    #[test]
    fn decode_requires_all_landmarks() {
        assert!(decode_landmarks(&[0.0; 62]).is_err());

        let flat: Vec<f32> = (0..66).map(|v| v as f32).collect();
        let landmarks = decode_landmarks(&flat).unwrap();
        assert_eq!(landmarks.len(), NUM_LANDMARKS);
        assert_eq!(landmarks[0], [0.0, 1.0, 2.0]);
        assert_eq!(landmarks[20], [60.0, 61.0, 62.0]);
    }

    #[test]
    fn unrotated_crop_projects_by_scale_and_offset() {
        let transform = CropTransform {
            center: (100.0, 80.0),
            side: 112.0,
            angle: 0.0,
            output_size: 224,
            orig_w: 640,
            orig_h: 480,
        };
        assert!(close(transform.project(112.0, 112.0), (100.0, 80.0)));
        assert!(close(transform.project(224.0, 112.0), (156.0, 80.0)));
        assert!(close(transform.project(0.0, 0.0), (44.0, 24.0)));
    }

    #[test]
    fn rotated_crop_turns_offsets() {
        let transform = CropTransform {
            center: (200.0, 200.0),
            side: 224.0,
            angle: FRAC_PI_2,
            output_size: 224,
            orig_w: 640,
            orig_h: 480,
        };
        // +x in the crop points down in the frame after a quarter turn.
        assert!(close(transform.project(212.0, 112.0), (200.0, 300.0)));
    }

    #[test]
    fn projection_clamps_to_frame() {
        let transform = CropTransform {
            center: (5.0, 5.0),
            side: 224.0,
            angle: 0.0,
            output_size: 224,
            orig_w: 64,
            orig_h: 48,
        };
        assert_eq!(transform.project(0.0, 0.0), (0.0, 0.0));
        assert_eq!(transform.project(224.0, 224.0), (63.0, 47.0));
    }

    #[test]
    fn letterbox_pads_the_short_side() {
        let wide = frame(40, 20, |_, _| [255, 255, 255, 255]);
        let (input, letterbox) = letterbox_frame(&wide, 20).unwrap();
        assert_eq!(input.shape(), &[1, 20, 20, 3]);
        assert!((letterbox.scale - 0.5).abs() < 1e-6);
        assert_eq!(letterbox.pad_x, 0.0);
        assert_eq!(letterbox.pad_y, 5.0);
        assert_eq!(input[[0, 0, 10, 0]], 0.0);
        assert!((input[[0, 10, 10, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn identity_crop_reproduces_pixels() {
        let src = frame(8, 8, |x, y| [(x * 30) as u8, (y * 30) as u8, 0, 255]);
        let (input, _) = rotated_crop(&src, (4.0, 4.0), 8.0, 0.0, 8).unwrap();
        assert_eq!(input.shape(), &[1, 8, 8, 3]);
        assert!((input[[0, 2, 3, 0]] - 90.0 / 255.0).abs() < 1e-4);
        assert!((input[[0, 2, 3, 1]] - 60.0 / 255.0).abs() < 1e-4);
    }

    #[test]
    fn mismatched_buffers_are_rejected() {
        let mut bad = frame(4, 4, |_, _| [0, 0, 0, 255]);
        bad.rgba.pop();
        assert!(letterbox_frame(&bad, 16).is_err());
        assert!(rotated_crop(&bad, (2.0, 2.0), 4.0, 0.0, 4).is_err());
    }
}
