// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory rasters shared by every stage of the pipeline.
//
// `RasterBuffer` is the interleaved colour image the pipeline carries from
// stage to stage. `GrayscaleBuffer` is the luminance view the analysis
// algorithms work on; reads outside it clamp to the nearest edge pixel.

use image::{DynamicImage, RgbImage, RgbaImage};
use richtwerk_core::error::{Result, RichtwerkError};

/// Interleaved 8-bit RGB or RGBA raster, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl RasterBuffer {
    /// Wrap raw samples, checking the shape.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RichtwerkError::InvalidInput(format!(
                "raster dimensions must be non-zero, got {width}x{height}"
            )));
        }
        if channels != 3 && channels != 4 {
            return Err(RichtwerkError::InvalidInput(format!(
                "raster must have 3 or 4 channels, got {channels}"
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(RichtwerkError::InvalidInput(format!(
                "raster of {width}x{height}x{channels} needs {expected} samples, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// A raster filled with one colour. Used by tests and synthetic inputs.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self::new(width, height, 3, data)
    }

    /// Convert a decoded image, keeping alpha only when the source has it.
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self> {
        if image.color().has_alpha() {
            let rgba = image.to_rgba8();
            let (w, h) = rgba.dimensions();
            Self::new(w, h, 4, rgba.into_raw())
        } else {
            let rgb = image.to_rgb8();
            let (w, h) = rgb.dimensions();
            Self::new(w, h, 3, rgb.into_raw())
        }
    }

    /// Convert back into an `image` value for encoding and warping.
    pub fn to_dynamic(&self) -> Result<DynamicImage> {
        let shape_error = || RichtwerkError::Image("raster shape does not match image buffer".into());
        if self.has_alpha() {
            RgbaImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(shape_error)
        } else {
            RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(shape_error)
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Samples per pixel (3 or 4).
    pub fn channels(&self) -> usize {
        self.channels as usize
    }

    pub fn has_alpha(&self) -> bool {
        self.channels == 4
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of samples in one row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels()
    }

    /// Sample at `(x, y, channel)` with replicate-border clamping.
    #[inline]
    pub fn sample_clamped(&self, x: isize, y: isize, channel: usize) -> u8 {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.data[cy * self.stride() + cx * self.channels() + channel]
    }

    /// Copy of this raster with new samples of the same shape.
    pub(crate) fn with_data(&self, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data,
        }
    }

    /// Rough peak working memory for one pass of the pipeline, in bytes.
    ///
    /// Covers a few copies of the raster plus the `f32` gradient and Harris
    /// planes the corner detector allocates.
    pub fn working_set_bytes(&self) -> u64 {
        let pixels = self.width as u64 * self.height as u64;
        let raster = self.data.len() as u64;
        raster * 4 + pixels * (4 * 6)
    }

    /// Luminance view.
    pub fn to_grayscale(&self) -> GrayscaleBuffer {
        let channels = self.channels();
        let data = self
            .data
            .chunks_exact(channels)
            .map(|px| luma(px[0], px[1], px[2]))
            .collect();
        GrayscaleBuffer {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

/// `0.299R + 0.587G + 0.114B`, rounded to nearest.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

/// Single-channel 8-bit raster, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayscaleBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl GrayscaleBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 || data.len() != width as usize * height as usize {
            return Err(RichtwerkError::InvalidInput(format!(
                "grayscale buffer of {width}x{height} cannot hold {} samples",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: u32, height: u32, value: u8) -> Result<Self> {
        Self::new(width, height, vec![value; width as usize * height as usize])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Sample at `(x, y)`, clamping out-of-range coordinates to the border.
    #[inline]
    pub fn get(&self, x: isize, y: isize) -> u8 {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.data[cy * self.width as usize + cx]
    }

    /// Same shape, new samples.
    pub(crate) fn with_data(&self, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// 256-bin intensity histogram.
    pub fn histogram(&self) -> [u64; 256] {
        let mut histogram = [0u64; 256];
        for &v in &self.data {
            histogram[v as usize] += 1;
        }
        histogram
    }

    /// Mean and standard deviation of the samples.
    pub fn mean_and_std(&self) -> (f64, f64) {
        let n = self.data.len() as f64;
        let mean = self.data.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = self
            .data
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        (mean, var.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_shapes() {
        assert!(RasterBuffer::new(0, 10, 3, vec![]).is_err());
        assert!(RasterBuffer::new(2, 2, 2, vec![0; 8]).is_err());
        assert!(RasterBuffer::new(2, 2, 3, vec![0; 11]).is_err());
        assert!(RasterBuffer::new(2, 2, 4, vec![0; 16]).is_ok());
    }

    #[test]
    fn luma_uses_rec601_weights() {
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 0, 0), 76);
        assert_eq!(luma(0, 255, 0), 150);
        assert_eq!(luma(0, 0, 255), 29);
    }

    /// Reads outside the buffer return the nearest edge sample.
    #[test]
    fn grayscale_reads_clamp_to_border() {
        let gray = GrayscaleBuffer::new(3, 2, vec![1, 2, 3, 4, 5, 6]).expect("shape");
        assert_eq!(gray.get(-5, -5), 1);
        assert_eq!(gray.get(10, 0), 3);
        assert_eq!(gray.get(1, 9), 5);
        assert_eq!(gray.get(2, 1), 6);
    }

    #[test]
    fn dynamic_round_trip_keeps_alpha() {
        let raster = RasterBuffer::new(2, 1, 4, vec![10, 20, 30, 40, 50, 60, 70, 80]).expect("shape");
        let dynamic = raster.to_dynamic().expect("to dynamic");
        let back = RasterBuffer::from_dynamic(&dynamic).expect("from dynamic");
        assert_eq!(back, raster);
    }
}
