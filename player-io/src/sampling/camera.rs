//! Camera frame conversion
//!
//! The simulation hands out BGRA frames. Raw transport drops the alpha byte
//! and keeps BGR order; JPEG transport reorders to RGB before compressing.

use crate::devices::CameraImage;
use crate::error::{Error, Result};
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use std::ops::RangeInclusive;

/// `quality` value announcing uncompressed BGR pixels
pub const RAW_QUALITY: i32 = -1;

/// Accepted JPEG quality levels
pub const JPEG_QUALITY: RangeInclusive<i32> = 1..=100;

/// Drop the alpha channel, keeping BGR order
pub fn bgra_to_bgr(bgra: &[u8]) -> Vec<u8> {
    let mut bgr = Vec::with_capacity(bgra.len() / 4 * 3);
    for px in bgra.chunks_exact(4) {
        bgr.extend_from_slice(&px[..3]);
    }
    bgr
}

/// Drop the alpha channel and swap to RGB order
pub fn bgra_to_rgb(bgra: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(bgra.len() / 4 * 3);
    for px in bgra.chunks_exact(4) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    rgb
}

/// Check that the pixel buffer holds exactly `width * height` BGRA pixels
pub fn check_frame(frame: &CameraImage) -> Result<()> {
    let expected = frame.width as usize * frame.height as usize * 4;
    if frame.bgra.len() != expected {
        return Err(Error::Other(format!(
            "Camera frame has {} bytes, expected {} for {}x{}",
            frame.bgra.len(),
            expected,
            frame.width,
            frame.height
        )));
    }
    Ok(())
}

/// Compress a frame to JPEG at `quality` (1..=100)
pub fn encode_jpeg(frame: &CameraImage, quality: u8) -> Result<Vec<u8>> {
    check_frame(frame)?;

    let rgb = bgra_to_rgb(&frame.bgra);
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder.encode(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)?;
    Ok(out)
}
