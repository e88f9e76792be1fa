use std::sync::Arc;

use gpui::RenderImage;
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::pipeline::CompositedFrame;

pub(super) fn composited_to_image(frame: &CompositedFrame) -> Option<Arc<RenderImage>> {
    let bgra = rgba_to_bgra(frame.rgba.clone());
    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(frame.width, frame.height, bgra)?;
    Some(Arc::new(RenderImage::new(vec![ImageFrame::new(buffer)])))
}

// RenderImage sprites are uploaded as BGRA.
fn rgba_to_bgra(mut rgba: Vec<u8>) -> Vec<u8> {
    for px in rgba.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_and_blue_channels_are_swapped() {
        let out = rgba_to_bgra(vec![1, 2, 3, 4, 10, 20, 30, 40]);
        assert_eq!(out, vec![3, 2, 1, 4, 30, 20, 10, 40]);
    }
}
