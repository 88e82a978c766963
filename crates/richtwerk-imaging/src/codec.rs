// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Codec collaborator: decoding, encoding, rotation and projective warping.
//
// The pipeline never touches file formats or resampling itself. It goes
// through `RasterCodec`, which `ImageCodec` implements on top of the `image`
// and `imageproc` crates.

use std::path::Path;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use nalgebra::Matrix3;
use richtwerk_core::error::{Result, RichtwerkError};
use richtwerk_core::transform::{GeometricTransformation, project};
use richtwerk_core::types::{OutputFormat, Point};
use tracing::{debug, info, instrument};

use crate::raster::RasterBuffer;

/// White, fully opaque. Used for pixels a warp uncovers.
pub const WHITE: [u8; 4] = [255, 255, 255, 255];

/// Image surface primitives the pipeline depends on.
pub trait RasterCodec: Send + Sync {
    /// Decode an image file.
    fn decode(&self, path: &Path) -> Result<RasterBuffer>;

    /// Decode an encoded image held in memory (PNG, JPEG, TIFF, ...).
    fn decode_bytes(&self, bytes: &[u8]) -> Result<RasterBuffer>;

    /// Encode a raster.
    fn encode(&self, raster: &RasterBuffer, format: OutputFormat) -> Result<Vec<u8>>;

    /// Rotate about the centre by `degrees` (positive = clockwise on screen),
    /// keeping the canvas size.
    fn rotate(&self, raster: &RasterBuffer, degrees: f64, fill: [u8; 4]) -> Result<RasterBuffer>;

    /// Resample through `matrix` (original → output coordinates) into an
    /// `out_width` x `out_height` canvas.
    fn warp(
        &self,
        raster: &RasterBuffer,
        matrix: &Matrix3<f64>,
        out_width: u32,
        out_height: u32,
        fill: [u8; 4],
    ) -> Result<RasterBuffer>;
}

/// `RasterCodec` backed by `image` + `imageproc`, bilinear interpolation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl ImageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl RasterCodec for ImageCodec {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn decode(&self, path: &Path) -> Result<RasterBuffer> {
        let image = image::open(path).map_err(|err| {
            RichtwerkError::Image(format!("failed to open {}: {}", path.display(), err))
        })?;
        info!(width = image.width(), height = image.height(), "Image loaded");
        RasterBuffer::from_dynamic(&image)
    }

    #[instrument(skip(self, bytes), fields(data_len = bytes.len()))]
    fn decode_bytes(&self, bytes: &[u8]) -> Result<RasterBuffer> {
        let image = image::load_from_memory(bytes)
            .map_err(|err| RichtwerkError::Image(format!("failed to decode image: {}", err)))?;
        debug!(width = image.width(), height = image.height(), "Image decoded from bytes");
        RasterBuffer::from_dynamic(&image)
    }

    fn encode(&self, raster: &RasterBuffer, format: OutputFormat) -> Result<Vec<u8>> {
        let image = raster.to_dynamic()?;
        match format {
            OutputFormat::Png => encode_to_format(&image, ImageFormat::Png),
            OutputFormat::Tiff => encode_to_format(&image, ImageFormat::Tiff),
            OutputFormat::Jpeg { quality } => {
                let mut buffer = Vec::new();
                let encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
                image.to_rgb8().write_with_encoder(encoder).map_err(|err| {
                    RichtwerkError::Image(format!("JPEG encoding failed: {}", err))
                })?;
                Ok(buffer)
            }
        }
    }

    #[instrument(skip(self, raster, fill), fields(width = raster.width(), height = raster.height()))]
    fn rotate(&self, raster: &RasterBuffer, degrees: f64, fill: [u8; 4]) -> Result<RasterBuffer> {
        let center = Point::new(raster.width() as f64 / 2.0, raster.height() as f64 / 2.0);
        let rotation = GeometricTransformation::rotation(degrees, center, 1.0);
        self.warp(raster, &rotation.to_matrix3(), raster.width(), raster.height(), fill)
    }

    fn warp(
        &self,
        raster: &RasterBuffer,
        matrix: &Matrix3<f64>,
        out_width: u32,
        out_height: u32,
        fill: [u8; 4],
    ) -> Result<RasterBuffer> {
        if out_width == 0 || out_height == 0 {
            return Err(RichtwerkError::InvalidInput(format!(
                "warp target must be non-empty, got {out_width}x{out_height}"
            )));
        }
        let projection = projection_for(matrix, raster.width(), raster.height())?;

        let output = if raster.has_alpha() {
            let input = RgbaImage::from_raw(raster.width(), raster.height(), raster.data().to_vec())
                .ok_or_else(|| RichtwerkError::Image("raster shape does not match RGBA buffer".into()))?;
            let mut out = RgbaImage::new(out_width, out_height);
            warp_into(&input, &projection, Interpolation::Bilinear, Rgba(fill), &mut out);
            DynamicImage::ImageRgba8(out)
        } else {
            let input = RgbImage::from_raw(raster.width(), raster.height(), raster.data().to_vec())
                .ok_or_else(|| RichtwerkError::Image("raster shape does not match RGB buffer".into()))?;
            let mut out = RgbImage::new(out_width, out_height);
            warp_into(
                &input,
                &projection,
                Interpolation::Bilinear,
                Rgb([fill[0], fill[1], fill[2]]),
                &mut out,
            );
            DynamicImage::ImageRgb8(out)
        };

        debug!(out_width, out_height, "Warp applied");
        RasterBuffer::from_dynamic(&output)
    }
}

/// Express `matrix` as an `imageproc` projection.
///
/// The projection is rebuilt from where the matrix sends the four image
/// corners, which pins down any non-degenerate homography.
fn projection_for(matrix: &Matrix3<f64>, width: u32, height: u32) -> Result<Projection> {
    let (w, h) = (width as f64, height as f64);
    let corners = [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    ];

    let mut src = [(0.0f32, 0.0f32); 4];
    let mut dst = [(0.0f32, 0.0f32); 4];
    for (i, corner) in corners.iter().enumerate() {
        let mapped = project(matrix, *corner).ok_or_else(|| {
            RichtwerkError::Image("warp matrix sends an image corner to infinity".into())
        })?;
        src[i] = (corner.x as f32, corner.y as f32);
        dst[i] = (mapped.x as f32, mapped.y as f32);
    }

    Projection::from_control_points(src, dst)
        .ok_or_else(|| RichtwerkError::Image("warp matrix is degenerate".into()))
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| RichtwerkError::Image(format!("image encoding failed: {}", err)))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_raster(w: u32, h: u32) -> RasterBuffer {
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[(x * 4) as u8, (y * 4) as u8, 128]);
            }
        }
        RasterBuffer::new(w, h, 3, data).expect("shape")
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let codec = ImageCodec::new();
        let raster = gradient_raster(40, 30);
        let bytes = codec.encode(&raster, OutputFormat::Png).expect("encode");
        let back = codec.decode_bytes(&bytes).expect("decode");
        assert_eq!(back, raster);
    }

    #[test]
    fn garbage_bytes_are_an_image_error() {
        let err = ImageCodec::new().decode_bytes(b"not an image").expect_err("must fail");
        assert!(matches!(err, RichtwerkError::Image(_)));
    }

    /// An identity warp reproduces the input away from the border.
    #[test]
    fn identity_warp_preserves_interior() {
        let codec = ImageCodec::new();
        let raster = gradient_raster(40, 30);
        let out = codec
            .warp(&raster, &Matrix3::identity(), 40, 30, WHITE)
            .expect("warp");
        assert_eq!(out.width(), 40);
        assert_eq!(out.height(), 30);
        for (x, y) in [(5isize, 5isize), (20, 15), (30, 25)] {
            for c in 0..3 {
                let a = raster.sample_clamped(x, y, c) as i32;
                let b = out.sample_clamped(x, y, c) as i32;
                assert!((a - b).abs() <= 1, "({x},{y},{c}): {a} vs {b}");
            }
        }
    }

    /// A small rotation keeps the canvas and fills uncovered corners white.
    #[test]
    fn rotation_keeps_size_and_fills_white() {
        let codec = ImageCodec::new();
        let raster = RasterBuffer::filled(100, 80, [0, 0, 0]).expect("raster");
        let out = codec.rotate(&raster, 10.0, WHITE).expect("rotate");
        assert_eq!((out.width(), out.height()), (100, 80));
        assert_eq!(out.sample_clamped(0, 0, 0), 255);
        assert_eq!(out.sample_clamped(50, 40, 0), 0);
    }
}
