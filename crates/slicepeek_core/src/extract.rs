//! Extraction façade: resolves the file type, runs the matching parser and
//! applies scale-to-fit.

use crate::bgcode::BGCodeSource;
use crate::config::ExtractConfig;
use crate::error::{Result, ThumbnailError};
use crate::gcode::GCodeSource;
use crate::raster::{RasterImage, fit};
use crate::traits::ThumbnailSource;
use crate::types::{Bounds, SlicerFileType, ThumbnailInfo};
use crate::zip::ThreeMfSource;

static THREE_MF: ThreeMfSource = ThreeMfSource;
static GCODE: GCodeSource = GCodeSource;
static BGCODE: BGCodeSource = BGCodeSource;

/// Returns the parser responsible for `file_type`.
#[must_use]
pub fn source_for(file_type: SlicerFileType) -> &'static dyn ThumbnailSource {
    match file_type {
        SlicerFileType::ThreeMf => &THREE_MF,
        SlicerFileType::GCode | SlicerFileType::Gco => &GCODE,
        SlicerFileType::BGCode => &BGCODE,
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractConfig,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExtractConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    pub fn extract(&self, data: &[u8], file_type: SlicerFileType) -> Result<RasterImage> {
        let image = source_for(file_type).extract(data, &self.config)?;
        tracing::debug!(
            "Extracted {}x{} preview from {} input",
            image.width(),
            image.height(),
            file_type
        );
        Ok(fit(image, &self.config))
    }

    /// Like [`Extractor::extract`], resolving the type from a file extension.
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` when the extension is not a known slicer format.
    pub fn extract_with_extension(&self, data: &[u8], extension: &str) -> Result<RasterImage> {
        self.extract(data, resolve_extension(extension)?)
    }

    pub fn list(&self, data: &[u8], file_type: SlicerFileType) -> Result<Vec<ThumbnailInfo>> {
        source_for(file_type).list(data, &self.config)
    }
}

pub fn resolve_extension(extension: &str) -> Result<SlicerFileType> {
    SlicerFileType::from_extension(extension)
        .ok_or_else(|| ThumbnailError::UnsupportedFormat(extension.to_string()))
}

/// Decodes the preview embedded in `data`, optionally shrunk to `max_size`.
pub fn extract(
    data: &[u8],
    file_type: SlicerFileType,
    max_size: Option<Bounds>,
) -> Result<RasterImage> {
    Extractor::with_config(ExtractConfig::new().with_max_size(max_size)).extract(data, file_type)
}

pub fn extract_with_extension(
    data: &[u8],
    extension: &str,
    max_size: Option<Bounds>,
) -> Result<RasterImage> {
    extract(data, resolve_extension(extension)?, max_size)
}

pub fn list_thumbnails(data: &[u8], file_type: SlicerFileType) -> Result<Vec<ThumbnailInfo>> {
    Extractor::new().list(data, file_type)
}
