//! Decoded RGBA images and the adapters around the `image` crate.
//!
//! PNG and JPEG decoding and resampling are delegated to `image`; QOI goes
//! through the in-crate decoder.

use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::config::ExtractConfig;
use crate::error::{Result, ThumbnailError};
use crate::types::{Bounds, ImageFormat, ThumbnailCandidate};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
pub const JPEG_SIGNATURE: [u8; 3] = [0xFF, 0xD8, 0xFF];
pub const QOI_MAGIC: [u8; 4] = *b"qoif";
/// Byte-swapped QOI magic, as written by encoders that store it as a LE u32.
pub const QOI_MAGIC_REVERSED: [u8; 4] = *b"fioq";

/// An 8-bit-per-channel RGBA raster. Scaling produces a new instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pixels: RgbaImage,
}

impl RasterImage {
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        let actual = pixels.len();
        RgbaImage::from_raw(width, height, pixels)
            .map(|pixels| Self { pixels })
            .ok_or_else(|| {
                ThumbnailError::ImageCreationFailed(format!(
                    "{}x{} RGBA needs {} bytes, got {}",
                    width, height, expected, actual
                ))
            })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Raw pixel bytes, row-major RGBA.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    #[inline]
    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.pixels
    }

    /// Shrinks the image to fit inside `bounds`, preserving aspect ratio.
    ///
    /// Never upscales: when the image already fits, `self` is returned as is.
    /// Zero-sized bounds are treated as one pixel.
    pub fn scale_to_fit(self, bounds: Bounds, filter: FilterType) -> Self {
        match fit_dimensions(self.dimensions(), bounds) {
            Some((width, height)) => Self {
                pixels: imageops::resize(&self.pixels, width, height, filter),
            },
            None => self,
        }
    }
}

impl From<RgbaImage> for RasterImage {
    fn from(pixels: RgbaImage) -> Self {
        Self { pixels }
    }
}

/// Applies the configured scale-to-fit bound, if any.
pub(crate) fn fit(image: RasterImage, config: &ExtractConfig) -> RasterImage {
    match config.max_size {
        Some(bounds) => image.scale_to_fit(bounds, config.filter),
        None => image,
    }
}

/// Target size for scale-to-fit, or `None` when no shrinking is needed.
pub fn fit_dimensions((src_w, src_h): (u32, u32), bounds: Bounds) -> Option<(u32, u32)> {
    if src_w == 0 || src_h == 0 {
        return None;
    }

    let bound_w = bounds.width.max(1);
    let bound_h = bounds.height.max(1);
    let scale = (bound_w as f64 / src_w as f64)
        .min(bound_h as f64 / src_h as f64)
        .min(1.0);

    if scale >= 1.0 {
        return None;
    }

    let width = ((src_w as f64 * scale).round() as u32).clamp(1, bound_w);
    let height = ((src_h as f64 * scale).round() as u32).clamp(1, bound_h);
    Some((width, height))
}

#[must_use]
pub fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
    if data.starts_with(&PNG_SIGNATURE) {
        Some(ImageFormat::Png)
    } else if data.starts_with(&JPEG_SIGNATURE) {
        Some(ImageFormat::Jpeg)
    } else if data.starts_with(&QOI_MAGIC) || data.starts_with(&QOI_MAGIC_REVERSED) {
        Some(ImageFormat::Qoi)
    } else {
        None
    }
}

/// Decodes a payload whose format is already known.
pub fn decode_as(data: &[u8], format: ImageFormat) -> Result<RasterImage> {
    match format {
        ImageFormat::Png => decode_external(data, Some(image::ImageFormat::Png)),
        ImageFormat::Jpeg => decode_external(data, Some(image::ImageFormat::Jpeg)),
        ImageFormat::Qoi => crate::qoi::decode_image(data).ok_or_else(|| {
            ThumbnailError::ImageCreationFailed("QOI stream could not be decoded".into())
        }),
    }
}

/// Decodes a payload by sniffing its signature, falling back to the
/// `image` crate's own format detection.
pub fn decode_sniffed(data: &[u8]) -> Result<RasterImage> {
    match sniff_format(data) {
        Some(format) => decode_as(data, format),
        None => decode_external(data, None),
    }
}

fn decode_external(data: &[u8], format: Option<image::ImageFormat>) -> Result<RasterImage> {
    let decoded = match format {
        Some(format) => image::load_from_memory_with_format(data, format),
        None => image::load_from_memory(data),
    };

    decoded
        .map(|img| RasterImage::from(img.to_rgba8()))
        .map_err(|e| ThumbnailError::ImageCreationFailed(e.to_string()))
}

/// Decodes the candidate with the largest declared area, falling back to the
/// next largest when a payload fails to decode.
///
/// Ties keep their scan order.
pub(crate) fn decode_largest(mut candidates: Vec<ThumbnailCandidate>) -> Result<RasterImage> {
    candidates.sort_by_key(|c| std::cmp::Reverse(c.declared_area()));

    for candidate in &candidates {
        let decoded = match candidate.format {
            Some(format) => decode_as(&candidate.payload, format),
            None => decode_external(&candidate.payload, None),
        };

        match decoded {
            Ok(image) => return Ok(image),
            Err(e) => tracing::debug!(
                "Skipping {}x{} thumbnail: {}",
                candidate.declared_width,
                candidate.declared_height,
                e
            ),
        }
    }

    Err(ThumbnailError::ThumbnailNotFound)
}
