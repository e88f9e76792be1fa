use rayon::prelude::*;
use thiserror::Error;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

/// Layouts a capture device hands us.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Nv12,
    Yuyv,
    Mjpeg,
    Rgb,
    Bgr,
    Gray,
}

impl PixelLayout {
    fn name(&self) -> &'static str {
        match self {
            PixelLayout::Nv12 => "NV12",
            PixelLayout::Yuyv => "YUYV",
            PixelLayout::Mjpeg => "MJPEG",
            PixelLayout::Rgb => "RGB",
            PixelLayout::Bgr => "BGR",
            PixelLayout::Gray => "GRAY",
        }
    }

    fn bytes_needed(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelLayout::Nv12 => pixels + pixels / 2,
            PixelLayout::Yuyv => pixels * 2,
            PixelLayout::Rgb | PixelLayout::Bgr => pixels * 3,
            PixelLayout::Gray => pixels,
            PixelLayout::Mjpeg => 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{layout} buffer too small: got {got}, expected {expected}")]
    BufferTooSmall {
        layout: &'static str,
        got: usize,
        expected: usize,
    },
    #[error("{layout} conversion failed: {reason}")]
    Decode {
        layout: &'static str,
        reason: String,
    },
}

#[derive(Debug)]
pub struct RgbaFrame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub fn to_rgba(
    layout: PixelLayout,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<RgbaFrame, ConvertError> {
    let expected = layout.bytes_needed(width, height);
    if data.len() < expected {
        return Err(ConvertError::BufferTooSmall {
            layout: layout.name(),
            got: data.len(),
            expected,
        });
    }

    let rgba = match layout {
        PixelLayout::Mjpeg => return decode_mjpeg(data),
        PixelLayout::Nv12 => nv12_to_rgba(data, width, height)?,
        PixelLayout::Yuyv => yuyv_to_rgba(data, width, height)?,
        PixelLayout::Rgb => packed_rgb_to_rgba(data, width, height, false),
        PixelLayout::Bgr => packed_rgb_to_rgba(data, width, height, true),
        PixelLayout::Gray => gray_to_rgba(data, width, height),
    };

    Ok(RgbaFrame {
        rgba,
        width,
        height,
    })
}

fn rgba_buffer(width: u32, height: u32) -> Vec<u8> {
    vec![0u8; width as usize * height as usize * 4]
}

fn nv12_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ConvertError> {
    let luma_len = width as usize * height as usize;
    let image = YuvBiPlanarImage {
        y_plane: &data[..luma_len],
        y_stride: width,
        uv_plane: &data[luma_len..luma_len + luma_len / 2],
        uv_stride: width,
        width,
        height,
    };

    let mut rgba = rgba_buffer(width, height);
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| ConvertError::Decode {
        layout: "NV12",
        reason: format!("{err:?}"),
    })?;
    Ok(rgba)
}

fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ConvertError> {
    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };

    let mut rgba = rgba_buffer(width, height);
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| ConvertError::Decode {
        layout: "YUYV",
        reason: format!("{err:?}"),
    })?;
    Ok(rgba)
}

fn decode_mjpeg(data: &[u8]) -> Result<RgbaFrame, ConvertError> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder.decode().map_err(|err| ConvertError::Decode {
        layout: "MJPEG",
        reason: format!("{err:?}"),
    })?;

    let (width, height) = decoder
        .info()
        .map(|info| (info.width as u32, info.height as u32))
        .ok_or_else(|| ConvertError::Decode {
            layout: "MJPEG",
            reason: "decoder reported no image info".to_string(),
        })?;

    let expected = width as usize * height as usize * 4;
    if rgba.len() < expected {
        return Err(ConvertError::BufferTooSmall {
            layout: "MJPEG",
            got: rgba.len(),
            expected,
        });
    }

    Ok(RgbaFrame {
        rgba,
        width,
        height,
    })
}

fn packed_rgb_to_rgba(data: &[u8], width: u32, height: u32, bgr: bool) -> Vec<u8> {
    let mut rgba = rgba_buffer(width, height);
    rgba.par_chunks_exact_mut(4)
        .zip(data.par_chunks_exact(3))
        .for_each(|(dst, src)| {
            let (r, b) = if bgr { (src[2], src[0]) } else { (src[0], src[2]) };
            dst.copy_from_slice(&[r, src[1], b, 255]);
        });
    rgba
}

fn gray_to_rgba(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut rgba = rgba_buffer(width, height);
    rgba.par_chunks_exact_mut(4)
        .zip(data.par_iter())
        .for_each(|(dst, &v)| dst.copy_from_slice(&[v, v, v, 255]));
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_and_bgr_become_opaque_rgba() {
        let data = [10u8, 20, 30, 40, 50, 60];
        let rgb = to_rgba(PixelLayout::Rgb, &data, 2, 1).unwrap();
        assert_eq!(rgb.rgba, vec![10, 20, 30, 255, 40, 50, 60, 255]);

        let bgr = to_rgba(PixelLayout::Bgr, &data, 2, 1).unwrap();
        assert_eq!(bgr.rgba, vec![30, 20, 10, 255, 60, 50, 40, 255]);
    }

    #[test]
    fn gray_is_replicated_to_all_channels() {
        let frame = to_rgba(PixelLayout::Gray, &[7, 200], 1, 2).unwrap();
        assert_eq!((frame.width, frame.height), (1, 2));
        assert_eq!(frame.rgba, vec![7, 7, 7, 255, 200, 200, 200, 255]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let err = to_rgba(PixelLayout::Yuyv, &[0u8; 10], 4, 4).unwrap_err();
        match err {
            ConvertError::BufferTooSmall {
                layout,
                got,
                expected,
            } => {
                assert_eq!(layout, "YUYV");
                assert_eq!(got, 10);
                assert_eq!(expected, 32);
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert!(matches!(
            to_rgba(PixelLayout::Nv12, &[0u8; 20], 4, 4),
            Err(ConvertError::BufferTooSmall { expected: 24, .. })
        ));
    }

    #[test]
    fn garbage_mjpeg_fails_to_decode() {
        let err = to_rgba(PixelLayout::Mjpeg, &[0u8, 1, 2, 3], 2, 2).unwrap_err();
        assert!(matches!(err, ConvertError::Decode { layout: "MJPEG", .. }));
    }
}
