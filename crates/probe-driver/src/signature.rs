//! Downsampled luminance signatures for motion detection.
//!
//! A full screenshot comparison would be dominated by compression noise
//! and far too large to hold three times per entry. Instead each capture is
//! shrunk so its longer dimension is at most [`ProbeConfig::signature_cap`]
//! pixels and reduced to per-pixel Rec. 709 luminance. Motion is the mean
//! absolute luminance difference between two signatures.
//!
//! [`ProbeConfig::signature_cap`]: crate::config::ProbeConfig

use image::imageops::FilterType;
use image::GenericImageView;

use crate::ProbeError;

/// Grayscale fingerprint of one rendering-surface capture.
#[derive(Clone, Debug)]
pub struct FrameSignature {
    width: u32,
    height: u32,
    luma: Vec<f64>,
}

impl FrameSignature {
    /// Decode a PNG capture and reduce it to a luminance grid. The aspect
    /// ratio is preserved; images already under the cap are not upscaled.
    pub fn from_png(bytes: &[u8], cap: u32) -> Result<Self, ProbeError> {
        let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
            .map_err(|err| ProbeError::Capture(format!("png decode failed: {err}")))?;

        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Err(ProbeError::Capture("empty capture".into()));
        }

        let img = if w.max(h) > cap {
            img.resize(cap, cap, FilterType::Triangle)
        } else {
            img
        };

        let (width, height) = img.dimensions();
        let rgb = img.to_rgb8();
        let luma = rgb
            .pixels()
            .map(|p| {
                let [r, g, b] = p.0;
                (0.2126 * f64::from(r) + 0.7152 * f64::from(g) + 0.0722 * f64::from(b)) / 255.0
            })
            .collect();

        Ok(Self {
            width,
            height,
            luma,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[cfg(test)]
    fn from_luma(width: u32, height: u32, luma: Vec<f64>) -> Self {
        assert_eq!(luma.len(), (width * height) as usize);
        Self {
            width,
            height,
            luma,
        }
    }
}

/// Mean absolute luminance difference in `[0.0, 1.0]`.
///
/// Returns `None` when the signatures have different dimensions, which
/// happens when the surface is resized mid-probe; the caller must treat
/// that pair as inconclusive rather than static.
pub fn motion_delta(a: &FrameSignature, b: &FrameSignature) -> Option<f64> {
    if a.width != b.width || a.height != b.height {
        return None;
    }
    if a.luma.is_empty() {
        return Some(0.0);
    }

    let total: f64 = a
        .luma
        .iter()
        .zip(&b.luma)
        .map(|(x, y)| (x - y).abs())
        .sum();
    Some(total / a.luma.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_of(width: u32, height: u32, pixel: Rgb<u8>) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, pixel);
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn caps_longer_dimension() {
        let png = png_of(640, 360, Rgb([10, 20, 30]));
        let sig = FrameSignature::from_png(&png, 128).unwrap();
        let (w, h) = sig.dimensions();
        assert_eq!(w, 128);
        assert_eq!(h, 72);
    }

    #[test]
    fn small_captures_are_not_upscaled() {
        let png = png_of(64, 48, Rgb([0, 0, 0]));
        let sig = FrameSignature::from_png(&png, 128).unwrap();
        assert_eq!(sig.dimensions(), (64, 48));
    }

    #[test]
    fn identical_frames_have_zero_delta() {
        let png = png_of(32, 32, Rgb([200, 100, 50]));
        let a = FrameSignature::from_png(&png, 128).unwrap();
        let b = FrameSignature::from_png(&png, 128).unwrap();
        assert_eq!(motion_delta(&a, &b), Some(0.0));
    }

    #[test]
    fn black_to_white_is_full_delta() {
        let a = FrameSignature::from_png(&png_of(16, 16, Rgb([0, 0, 0])), 128).unwrap();
        let b = FrameSignature::from_png(&png_of(16, 16, Rgb([255, 255, 255])), 128).unwrap();
        let delta = motion_delta(&a, &b).unwrap();
        assert!((delta - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mismatched_dimensions_are_inconclusive() {
        let a = FrameSignature::from_luma(2, 2, vec![0.0; 4]);
        let b = FrameSignature::from_luma(2, 3, vec![0.0; 6]);
        assert!(motion_delta(&a, &b).is_none());
    }

    #[test]
    fn garbage_bytes_are_a_capture_error() {
        let err = FrameSignature::from_png(b"not a png", 128).unwrap_err();
        assert!(matches!(err, ProbeError::Capture(_)));
    }
}
