//! Captured frames and pixel-space regions.
//!
//! `Frame` is an owned RGB image as produced by a camera source. Unlike a
//! privacy-preserving pipeline, this system deliberately exposes pixels:
//! face crops are written to disk for the recognizer and unknown faces are
//! archived for review.

use anyhow::{anyhow, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Axis-aligned region in pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bbox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Bbox {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
}

/// One captured RGB frame (8 bits per channel, row-major, interleaved).
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame buffer is {} bytes, expected {} for {}x{} RGB",
                pixels.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Extract the region under `bbox`, clamped to the frame borders.
    /// An empty intersection is an error.
    pub fn crop(&self, bbox: &Bbox) -> Result<Frame> {
        let x0 = bbox.x.min(self.width);
        let y0 = bbox.y.min(self.height);
        let x1 = bbox.x.saturating_add(bbox.w).min(self.width);
        let y1 = bbox.y.saturating_add(bbox.h).min(self.height);
        let (w, h) = (x1 - x0, y1 - y0);
        if w == 0 || h == 0 {
            return Err(anyhow!(
                "crop {:?} does not intersect {}x{} frame",
                bbox,
                self.width,
                self.height
            ));
        }

        let mut pixels = Vec::with_capacity(w as usize * h as usize * 3);
        let stride = self.width as usize * 3;
        for row in y0..y1 {
            let start = row as usize * stride + x0 as usize * 3;
            let end = start + w as usize * 3;
            pixels.extend_from_slice(&self.pixels[start..end]);
        }
        Frame::new(pixels, w, h)
    }

    pub fn to_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match declared dimensions"))
    }

    pub fn from_image(image: &RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            pixels: image.as_raw().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push((x % 256) as u8);
                pixels.push((y % 256) as u8);
                pixels.push(((x + y) % 256) as u8);
            }
        }
        Frame::new(pixels, width, height).unwrap()
    }

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(Frame::new(vec![0u8; 10], 4, 4).is_err());
    }

    #[test]
    fn crop_extracts_region() {
        let frame = gradient_frame(8, 8);
        let crop = frame.crop(&Bbox::new(2, 3, 4, 2)).unwrap();
        assert_eq!(crop.width, 4);
        assert_eq!(crop.height, 2);
        // First pixel of the crop is frame pixel (2, 3).
        assert_eq!(&crop.pixels()[..3], &[2, 3, 5]);
    }

    #[test]
    fn crop_clamps_to_borders() {
        let frame = gradient_frame(8, 8);
        let crop = frame.crop(&Bbox::new(6, 6, 10, 10)).unwrap();
        assert_eq!(crop.width, 2);
        assert_eq!(crop.height, 2);
    }

    #[test]
    fn crop_outside_frame_is_an_error() {
        let frame = gradient_frame(8, 8);
        assert!(frame.crop(&Bbox::new(9, 9, 4, 4)).is_err());
        assert!(frame.crop(&Bbox::new(0, 0, 0, 4)).is_err());
    }

    #[test]
    fn image_round_trip_preserves_pixels() {
        let frame = gradient_frame(5, 4);
        let image = frame.to_image().unwrap();
        let back = Frame::from_image(&image);
        assert_eq!(back.pixels(), frame.pixels());
        assert_eq!((back.width, back.height), (5, 4));
    }
}
